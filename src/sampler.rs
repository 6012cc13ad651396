// Metrics sampler: one queue-length sample per run, plus one action-delay sample summarising
// the moderator actions handled since the previous run. A failed run is logged and dropped;
// the next tick simply takes the next sample.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::alerts::{self, Alert, Notifier};
use crate::config::AlertConfig;
use crate::models::{
    ActionDelaySample, ActorKind, HandledAction, QueueItem, QueueLengthSample, QueueSnapshot,
    RawSample,
};
use crate::sample_store::SampleStore;

/// Live view of the review queue.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Every item currently queued, read in one consistent pass. The queue length is its size.
    async fn queue_items(&self) -> anyhow::Result<Vec<QueueItem>>;

    /// Handling actions completed since the previous call, automated ones included.
    async fn drain_handled(&self) -> anyhow::Result<Vec<HandledAction>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("measuring {what} failed: {cause}")]
    Measure {
        what: &'static str,
        cause: anyhow::Error,
    },
    #[error("writing {what} sample failed: {cause}")]
    Write {
        what: &'static str,
        cause: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub queue_length: QueueLengthSample,
    pub action_delay: Option<ActionDelaySample>,
    pub alert: Option<Alert>,
}

/// Mean/max/count over moderator actions; automated actions are excluded. None if nothing
/// qualifying happened.
pub fn summarize_delays(
    actions: &[HandledAction],
    timestamp: DateTime<Utc>,
) -> Option<ActionDelaySample> {
    let delays: Vec<f64> = actions
        .iter()
        .filter(|a| a.actor == ActorKind::Moderator)
        .map(|a| a.delay_secs.max(0.0))
        .collect();
    if delays.is_empty() {
        return None;
    }
    let mean = delays.iter().sum::<f64>() / delays.len() as f64;
    let max = delays.iter().copied().fold(0.0, f64::max);
    Some(ActionDelaySample {
        timestamp,
        mean_delay_secs: mean,
        max_delay_secs: max,
        sample_count: delays.len() as u32,
    })
}

pub struct Sampler {
    store: Arc<SampleStore>,
    source: Arc<dyn QueueSource>,
    notifier: Option<Arc<dyn Notifier>>,
    alerts: AlertConfig,
}

impl Sampler {
    pub fn new(
        store: Arc<SampleStore>,
        source: Arc<dyn QueueSource>,
        notifier: Option<Arc<dyn Notifier>>,
        alerts: AlertConfig,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            alerts,
        }
    }

    #[instrument(skip(self), fields(job = "sample_queue"))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SampleOutcome, SampleError> {
        let items = self
            .source
            .queue_items()
            .await
            .map_err(|cause| SampleError::Measure {
                what: "queue items",
                cause,
            })?;
        // Length and items come from the same read so per-post shares add up.
        let queue_length = items.len() as u32;
        let handled = self
            .source
            .drain_handled()
            .await
            .map_err(|cause| SampleError::Measure {
                what: "handled actions",
                cause,
            })?;

        let queue_sample = QueueLengthSample::observed(now, queue_length);
        let delay_sample = summarize_delays(&handled, now);

        self.store
            .append_raw(&RawSample::QueueLength(queue_sample.clone()))
            .await
            .map_err(|cause| SampleError::Write {
                what: "queue length",
                cause,
            })?;
        if let Some(delay) = &delay_sample {
            self.store
                .append_raw(&RawSample::ActionDelay(delay.clone()))
                .await
                .map_err(|cause| SampleError::Write {
                    what: "action delay",
                    cause,
                })?;
        }
        debug!(
            queue_length,
            actions = delay_sample.as_ref().map(|d| d.sample_count).unwrap_or(0),
            "sample recorded"
        );

        let snapshot = QueueSnapshot {
            queue_length,
            items,
        };
        let alert =
            alerts::check_and_notify(&self.alerts, &snapshot, self.notifier.as_deref(), now).await;

        Ok(SampleOutcome {
            queue_length: queue_sample,
            action_delay: delay_sample,
            alert,
        })
    }
}
