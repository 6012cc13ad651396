// Rollup support: schema for the hourly table, hour bucketing, and the weighted merge.
// DB access (get, upsert, delete) stays in sample_store::mod.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::AggregatedSample;

pub const MS_PER_HOUR: i64 = 3_600_000;

/// Creates the hourly_samples table if not present. One row per (metric, bucket_key).
pub async fn init_hourly_table(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hourly_samples (
            metric TEXT NOT NULL,
            bucket_key TEXT NOT NULL,
            bucket_start INTEGER NOT NULL,
            mean_value REAL NOT NULL,
            max_value REAL NOT NULL,
            sample_count INTEGER NOT NULL,
            PRIMARY KEY (metric, bucket_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_hourly_metric_start ON hourly_samples(metric, bucket_start)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Weighted merge of already-aggregated samples.
/// mean is weighted by sample_count, max is the max of maxes, counts add up.
/// Returns None for an empty slice: no data is not a zero aggregate.
pub fn merge(samples: &[AggregatedSample]) -> Option<AggregatedSample> {
    if samples.is_empty() {
        return None;
    }

    let sample_count: u32 = samples.iter().map(|s| s.sample_count).sum();
    if sample_count == 0 {
        return None;
    }
    let weighted_sum: f64 = samples
        .iter()
        .map(|s| s.mean_value * s.sample_count as f64)
        .sum();
    let max_value = samples
        .iter()
        .map(|s| s.max_value)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(AggregatedSample {
        mean_value: weighted_sum / sample_count as f64,
        max_value,
        sample_count,
    })
}

/// Start of the UTC hour containing `ts`.
pub fn hour_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let ms = ts.timestamp_millis().div_euclid(MS_PER_HOUR) * MS_PER_HOUR;
    DateTime::from_timestamp_millis(ms).unwrap_or(ts)
}

/// Deterministic key for the hour containing `ts`, e.g. "2026-10-19T14:00Z".
pub fn hourly_bucket_key(ts: DateTime<Utc>) -> String {
    hour_start(ts).format("%Y-%m-%dT%H:00Z").to_string()
}
