// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use queuestats::alerts::{Alert, Notifier};
use queuestats::models::*;
use queuestats::sample_store::SampleStore;
use queuestats::sampler::QueueSource;
use std::sync::Mutex;
use tempfile::TempDir;

/// Store on a fresh temp database. Keep the TempDir alive for the test's duration.
pub async fn temp_store() -> (TempDir, SampleStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("samples.db");
    let store = SampleStore::connect(path.to_str().unwrap(), 2).await.unwrap();
    store.init().await.unwrap();
    (dir, store)
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn queue_raw(ts: DateTime<Utc>, len: u32) -> RawSample {
    RawSample::QueueLength(QueueLengthSample::observed(ts, len))
}

pub fn delay_raw(ts: DateTime<Utc>, mean: f64, max: f64, count: u32) -> RawSample {
    RawSample::ActionDelay(ActionDelaySample {
        timestamp: ts,
        mean_delay_secs: mean,
        max_delay_secs: max,
        sample_count: count,
    })
}

pub fn agg(mean: f64, max: f64, count: u32) -> AggregatedSample {
    AggregatedSample {
        mean_value: mean,
        max_value: max,
        sample_count: count,
    }
}

pub fn item(id: &str, post: &str, queued_at: DateTime<Utc>) -> QueueItem {
    QueueItem {
        item_id: id.into(),
        post_id: post.into(),
        queued_at,
    }
}

/// Fixed queue contents plus a batch of handled actions returned once.
#[derive(Default)]
pub struct FakeSource {
    pub items: Vec<QueueItem>,
    pub handled: Mutex<Vec<HandledAction>>,
    pub fail: bool,
}

#[async_trait]
impl QueueSource for FakeSource {
    async fn queue_items(&self) -> anyhow::Result<Vec<QueueItem>> {
        anyhow::ensure!(!self.fail, "queue unavailable");
        Ok(self.items.clone())
    }

    async fn drain_handled(&self) -> anyhow::Result<Vec<HandledAction>> {
        Ok(std::mem::take(&mut *self.handled.lock().unwrap()))
    }
}

/// Records every alert; optionally fails delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Alert>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(alert.clone());
        anyhow::ensure!(!self.fail, "webhook down");
        Ok(())
    }
}
