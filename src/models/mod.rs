// Domain models

mod queue;
mod sample;

pub use queue::{ActorKind, HandledAction, QueueItem, QueueSnapshot};
pub use sample::{
    ActionDelaySample, AggregatedSample, HourlyAggregate, Metric, QueueLengthSample, RawSample,
    SeriesEntry, StoredRawSample,
};
