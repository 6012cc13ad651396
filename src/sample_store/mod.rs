// SQLite sample store. Raw samples are append-only rows; hourly aggregates are keyed by
// (metric, bucket_key) so re-running a rollup merges into the same row instead of adding one.
// Timestamps are UTC milliseconds.

pub mod aggregation;
mod documents;

use crate::models::{
    ActionDelaySample, AggregatedSample, HourlyAggregate, Metric, QueueLengthSample, RawSample,
    SeriesEntry, StoredRawSample,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// Max bound parameters per DELETE ... IN (...) statement.
const DELETE_CHUNK: usize = 500;

pub struct SampleStore {
    pool: SqlitePool,
}

impl SampleStore {
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                metric TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                mean_value REAL NOT NULL,
                max_value REAL NOT NULL,
                sample_count INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_raw_metric_created_at ON raw_samples(metric, created_at)",
        )
        .execute(&self.pool)
        .await?;

        aggregation::init_hourly_table(&self.pool).await?;
        documents::init_documents_table(&self.pool).await?;

        Ok(())
    }

    #[instrument(skip(self, sample), fields(repo = "samples", operation = "append_raw", metric = %sample.metric()))]
    pub async fn append_raw(&self, sample: &RawSample) -> anyhow::Result<i64> {
        let agg = sample.to_aggregated();
        let r = sqlx::query(
            "INSERT INTO raw_samples (metric, created_at, mean_value, max_value, sample_count) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(sample.metric().as_str())
        .bind(sample.timestamp().timestamp_millis())
        .bind(agg.mean_value)
        .bind(agg.max_value)
        .bind(agg.sample_count as i64)
        .execute(&self.pool)
        .await?;
        Ok(r.last_insert_rowid())
    }

    /// Raw samples in [from, to]. Order: ascending by created_at.
    #[instrument(skip(self), fields(repo = "samples", operation = "get_raw_range"))]
    pub async fn get_raw_range(
        &self,
        metric: Metric,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<StoredRawSample>> {
        let rows = sqlx::query(
            "SELECT id, metric, created_at, mean_value, max_value, sample_count
             FROM raw_samples WHERE metric = $1 AND created_at >= $2 AND created_at <= $3
             ORDER BY created_at ASC, id ASC",
        )
        .bind(metric.as_str())
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_raw_row).collect()
    }

    /// Raw samples strictly older than `cutoff`. Order: ascending by created_at.
    #[instrument(skip(self), fields(repo = "samples", operation = "get_raw_before"))]
    pub async fn get_raw_before(
        &self,
        metric: Metric,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<StoredRawSample>> {
        let rows = sqlx::query(
            "SELECT id, metric, created_at, mean_value, max_value, sample_count
             FROM raw_samples WHERE metric = $1 AND created_at < $2
             ORDER BY created_at ASC, id ASC",
        )
        .bind(metric.as_str())
        .bind(cutoff.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_raw_row).collect()
    }

    pub async fn get_all_raw(&self, metric: Metric) -> anyhow::Result<Vec<StoredRawSample>> {
        let rows = sqlx::query(
            "SELECT id, metric, created_at, mean_value, max_value, sample_count
             FROM raw_samples WHERE metric = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(metric.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_raw_row).collect()
    }

    /// Delete raw rows by id. Returns the number of rows removed.
    #[instrument(skip(self, ids), fields(repo = "samples", operation = "delete_raw", ids_count = ids.len()))]
    pub async fn delete_raw(&self, ids: &[i64]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let deleted = delete_ids(&mut tx, ids).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    pub async fn get_hourly(
        &self,
        metric: Metric,
        bucket_key: &str,
    ) -> anyhow::Result<Option<HourlyAggregate>> {
        let row = sqlx::query(
            "SELECT metric, bucket_key, bucket_start, mean_value, max_value, sample_count
             FROM hourly_samples WHERE metric = $1 AND bucket_key = $2",
        )
        .bind(metric.as_str())
        .bind(bucket_key)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(parse_hourly_row).transpose()
    }

    /// Insert or replace the aggregate stored under (metric, bucket_key).
    #[instrument(skip(self, hourly), fields(repo = "samples", operation = "put_hourly", bucket = %hourly.bucket_key))]
    pub async fn put_hourly(&self, hourly: &HourlyAggregate) -> anyhow::Result<()> {
        upsert_hourly(&self.pool, hourly).await
    }

    /// All hourly aggregates for a metric. Order: ascending by bucket_start.
    pub async fn list_hourly(&self, metric: Metric) -> anyhow::Result<Vec<HourlyAggregate>> {
        let rows = sqlx::query(
            "SELECT metric, bucket_key, bucket_start, mean_value, max_value, sample_count
             FROM hourly_samples WHERE metric = $1 ORDER BY bucket_start ASC",
        )
        .bind(metric.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_hourly_row).collect()
    }

    /// Writes the merged aggregate and deletes the raw rows it consumed, in one transaction.
    /// If any consumed id is already gone the whole group is rolled back, so an observation
    /// can never be folded in twice.
    #[instrument(
        skip(self, hourly, consumed_ids),
        fields(repo = "samples", operation = "commit_rollup_group", bucket = %hourly.bucket_key, consumed = consumed_ids.len())
    )]
    pub async fn commit_rollup_group(
        &self,
        hourly: &HourlyAggregate,
        consumed_ids: &[i64],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_hourly(&mut *tx, hourly).await?;
        let deleted = delete_ids(&mut tx, consumed_ids).await?;
        anyhow::ensure!(
            deleted == consumed_ids.len() as u64,
            "rollup of {} {}: expected to delete {} raw rows, deleted {}",
            hourly.metric,
            hourly.bucket_key,
            consumed_ids.len(),
            deleted
        );
        tx.commit().await?;
        Ok(())
    }

    /// Full history of a metric: hourly aggregates and remaining raw rows, time-ordered.
    #[instrument(skip(self), fields(repo = "samples", operation = "load_series"))]
    pub async fn load_series(&self, metric: Metric) -> anyhow::Result<Vec<SeriesEntry>> {
        let hourly = self.list_hourly(metric).await?;
        let raw = self.get_all_raw(metric).await?;
        let mut out = Vec::with_capacity(hourly.len() + raw.len());
        out.extend(hourly.into_iter().map(SeriesEntry::Hourly));
        out.extend(raw.into_iter().map(|r| SeriesEntry::Raw(r.sample)));
        out.sort_by_key(|e| e.timestamp());
        Ok(out)
    }

    /// Reclaim space after rollup deletes.
    #[instrument(skip(self), fields(repo = "samples", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

async fn upsert_hourly<'e, E>(executor: E, hourly: &HourlyAggregate) -> anyhow::Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO hourly_samples (metric, bucket_key, bucket_start, mean_value, max_value, sample_count)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT(metric, bucket_key) DO UPDATE SET
            bucket_start = excluded.bucket_start,
            mean_value = excluded.mean_value,
            max_value = excluded.max_value,
            sample_count = excluded.sample_count
        "#,
    )
    .bind(hourly.metric.as_str())
    .bind(&hourly.bucket_key)
    .bind(hourly.bucket_start.timestamp_millis())
    .bind(hourly.aggregate.mean_value)
    .bind(hourly.aggregate.max_value)
    .bind(hourly.aggregate.sample_count as i64)
    .execute(executor)
    .await?;
    Ok(())
}

async fn delete_ids(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    ids: &[i64],
) -> anyhow::Result<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(DELETE_CHUNK) {
        let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new("DELETE FROM raw_samples WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        deleted += qb.build().execute(&mut **tx).await?.rows_affected();
    }
    Ok(deleted)
}

fn timestamp_from_ms(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| anyhow::anyhow!("timestamp out of range: {}", ms))
}

fn parse_raw_row(row: &SqliteRow) -> anyhow::Result<StoredRawSample> {
    let id: i64 = row.try_get("id")?;
    let metric: String = row.try_get("metric")?;
    let created_at: i64 = row.try_get("created_at")?;
    let mean_value: f64 = row.try_get("mean_value")?;
    let max_value: f64 = row.try_get("max_value")?;
    let sample_count: i64 = row.try_get("sample_count")?;

    let timestamp = timestamp_from_ms(created_at)?;
    let sample_count = u32::try_from(sample_count)?;
    let sample = match Metric::from_str(&metric)? {
        Metric::QueueLength => RawSample::QueueLength(QueueLengthSample {
            timestamp,
            queue_length: mean_value.round() as u32,
            sample_count,
        }),
        Metric::ActionDelay => RawSample::ActionDelay(ActionDelaySample {
            timestamp,
            mean_delay_secs: mean_value,
            max_delay_secs: max_value,
            sample_count,
        }),
    };
    Ok(StoredRawSample { id, sample })
}

fn parse_hourly_row(row: &SqliteRow) -> anyhow::Result<HourlyAggregate> {
    let metric: String = row.try_get("metric")?;
    let bucket_key: String = row.try_get("bucket_key")?;
    let bucket_start: i64 = row.try_get("bucket_start")?;
    let mean_value: f64 = row.try_get("mean_value")?;
    let max_value: f64 = row.try_get("max_value")?;
    let sample_count: i64 = row.try_get("sample_count")?;

    Ok(HourlyAggregate {
        metric: Metric::from_str(&metric)?,
        bucket_key,
        bucket_start: timestamp_from_ms(bucket_start)?,
        aggregate: AggregatedSample {
            mean_value,
            max_value,
            sample_count: u32::try_from(sample_count)?,
        },
    })
}
