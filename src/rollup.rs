// Rollup: fold raw samples older than the cutoff into one aggregate per metric per UTC hour,
// then delete them. Each hour group commits atomically; an earlier committed group stays valid
// if a later one fails. Re-running is safe: an existing aggregate is merged in as one more input.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, instrument, warn};

use crate::config::RollupConfig;
use crate::models::{AggregatedSample, HourlyAggregate, Metric, StoredRawSample};
use crate::sample_store::SampleStore;
use crate::sample_store::aggregation::{hour_start, hourly_bucket_key, merge};

/// Store operations a rollup pass needs.
#[async_trait]
pub trait RollupStore: Send + Sync {
    async fn get_raw_before(
        &self,
        metric: Metric,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<StoredRawSample>>;
    async fn get_hourly(
        &self,
        metric: Metric,
        bucket_key: &str,
    ) -> anyhow::Result<Option<HourlyAggregate>>;
    async fn commit_rollup_group(
        &self,
        hourly: &HourlyAggregate,
        consumed_ids: &[i64],
    ) -> anyhow::Result<()>;
    async fn vacuum(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl RollupStore for SampleStore {
    async fn get_raw_before(
        &self,
        metric: Metric,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<StoredRawSample>> {
        SampleStore::get_raw_before(self, metric, cutoff).await
    }

    async fn get_hourly(
        &self,
        metric: Metric,
        bucket_key: &str,
    ) -> anyhow::Result<Option<HourlyAggregate>> {
        SampleStore::get_hourly(self, metric, bucket_key).await
    }

    async fn commit_rollup_group(
        &self,
        hourly: &HourlyAggregate,
        consumed_ids: &[i64],
    ) -> anyhow::Result<()> {
        SampleStore::commit_rollup_group(self, hourly, consumed_ids).await
    }

    async fn vacuum(&self) -> anyhow::Result<()> {
        SampleStore::vacuum(self).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupStats {
    pub groups: u32,
    pub raw_consumed: u64,
}

/// Raw samples before this instant are eligible. Aligned to the top of the hour so a group is
/// never split across two runs unless retention changes.
pub fn cutoff(now: DateTime<Utc>, config: &RollupConfig) -> DateTime<Utc> {
    hour_start(now - TimeDelta::hours(config.raw_retention_hours as i64))
}

/// Groups raw samples by the start of their UTC hour.
pub fn group_by_hour(
    samples: Vec<StoredRawSample>,
) -> BTreeMap<DateTime<Utc>, Vec<StoredRawSample>> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<StoredRawSample>> = BTreeMap::new();
    for s in samples {
        groups
            .entry(hour_start(s.sample.timestamp()))
            .or_default()
            .push(s);
    }
    groups
}

/// Rolls up one metric. Stops at the first failing group; earlier groups stay committed.
#[instrument(skip(store), fields(job = "rollup_storage"))]
pub async fn rollup_metric(
    store: &dyn RollupStore,
    metric: Metric,
    cutoff: DateTime<Utc>,
) -> anyhow::Result<RollupStats> {
    let raw = store.get_raw_before(metric, cutoff).await?;
    let mut stats = RollupStats::default();

    for (bucket_start, group) in group_by_hour(raw) {
        let bucket_key = hourly_bucket_key(bucket_start);
        let mut inputs: Vec<AggregatedSample> =
            group.iter().map(|s| s.sample.to_aggregated()).collect();
        if let Some(existing) = store.get_hourly(metric, &bucket_key).await? {
            inputs.push(existing.aggregate);
        }
        let Some(aggregate) = merge(&inputs) else {
            continue;
        };
        let ids: Vec<i64> = group.iter().map(|s| s.id).collect();
        let hourly = HourlyAggregate {
            metric,
            bucket_key,
            bucket_start,
            aggregate,
        };
        if let Err(e) = store.commit_rollup_group(&hourly, &ids).await {
            warn!(
                %metric,
                bucket = %hourly.bucket_key,
                committed_groups = stats.groups,
                error = %e,
                "rollup group failed; stopping"
            );
            return Err(e);
        }
        stats.groups += 1;
        stats.raw_consumed += ids.len() as u64;
    }

    Ok(stats)
}

/// One daily pass over both metrics, then VACUUM to hand back the freed pages.
pub async fn run_rollup(
    store: &dyn RollupStore,
    config: &RollupConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<RollupStats> {
    let cutoff = cutoff(now, config);
    let mut total = RollupStats::default();
    for metric in Metric::ALL {
        let stats = rollup_metric(store, metric, cutoff).await?;
        if stats.groups > 0 {
            info!(
                %metric,
                hourly_buckets = stats.groups,
                raw_consumed = stats.raw_consumed,
                "raw -> hourly rollup"
            );
        }
        total.groups += stats.groups;
        total.raw_consumed += stats.raw_consumed;
    }
    if total.raw_consumed > 0 {
        store.vacuum().await?;
    }
    Ok(total)
}
