// Samples for the two tracked metrics, raw and hourly.
// Every tier converts to AggregatedSample so merging never needs to know where a value came from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two series this service records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    QueueLength,
    ActionDelay,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::QueueLength, Metric::ActionDelay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::QueueLength => "queue_length",
            Metric::ActionDelay => "action_delay",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue_length" => Ok(Metric::QueueLength),
            "action_delay" => Ok(Metric::ActionDelay),
            other => anyhow::bail!("unknown metric {:?}", other),
        }
    }
}

/// Merge shape: mean and max over `sample_count` underlying observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSample {
    pub mean_value: f64,
    pub max_value: f64,
    pub sample_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueLengthSample {
    pub timestamp: DateTime<Utc>,
    pub queue_length: u32,
    pub sample_count: u32,
}

impl QueueLengthSample {
    /// A directly observed queue length (sample_count = 1).
    pub fn observed(timestamp: DateTime<Utc>, queue_length: u32) -> Self {
        Self {
            timestamp,
            queue_length,
            sample_count: 1,
        }
    }
}

/// Handling latencies seen in one sampling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDelaySample {
    pub timestamp: DateTime<Utc>,
    pub mean_delay_secs: f64,
    pub max_delay_secs: f64,
    pub sample_count: u32,
}

/// A raw row as captured by the sampler.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSample {
    QueueLength(QueueLengthSample),
    ActionDelay(ActionDelaySample),
}

impl RawSample {
    pub fn metric(&self) -> Metric {
        match self {
            RawSample::QueueLength(_) => Metric::QueueLength,
            RawSample::ActionDelay(_) => Metric::ActionDelay,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RawSample::QueueLength(s) => s.timestamp,
            RawSample::ActionDelay(s) => s.timestamp,
        }
    }

    /// Queue length has no separate mean/max per observation, so both take the value.
    pub fn to_aggregated(&self) -> AggregatedSample {
        match self {
            RawSample::QueueLength(s) => AggregatedSample {
                mean_value: s.queue_length as f64,
                max_value: s.queue_length as f64,
                sample_count: s.sample_count,
            },
            RawSample::ActionDelay(s) => AggregatedSample {
                mean_value: s.mean_delay_secs,
                max_value: s.max_delay_secs,
                sample_count: s.sample_count,
            },
        }
    }
}

/// Raw sample plus its row id; the id is what rollup deletes by.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRawSample {
    pub id: i64,
    pub sample: RawSample,
}

/// One merged bucket per metric per calendar hour (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyAggregate {
    pub metric: Metric,
    pub bucket_key: String,
    pub bucket_start: DateTime<Utc>,
    pub aggregate: AggregatedSample,
}

/// An entry of a metric's full history: either tier, read back in time order.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesEntry {
    Raw(RawSample),
    Hourly(HourlyAggregate),
}

impl SeriesEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SeriesEntry::Raw(s) => s.timestamp(),
            SeriesEntry::Hourly(h) => h.bucket_start,
        }
    }

    pub fn to_aggregated(&self) -> AggregatedSample {
        match self {
            SeriesEntry::Raw(s) => s.to_aggregated(),
            SeriesEntry::Hourly(h) => h.aggregate,
        }
    }
}
