// SampleStore tests: init, raw append/read/delete, hourly upsert, atomic rollup commit, documents

mod common;

use common::{agg, at, delay_raw, queue_raw, temp_store};
use queuestats::models::{HourlyAggregate, Metric, RawSample, SeriesEntry};
use queuestats::report::{DocumentLookup, DocumentPublisher, INITIAL_SETTINGS, Permission};

fn hourly(metric: Metric, key: &str, start: chrono::DateTime<chrono::Utc>, count: u32) -> HourlyAggregate {
    HourlyAggregate {
        metric,
        bucket_key: key.into(),
        bucket_start: start,
        aggregate: agg(5.0, 9.0, count),
    }
}

#[tokio::test]
async fn init_is_idempotent() {
    let (_dir, store) = temp_store().await;
    store.init().await.unwrap();
    assert!(store.get_all_raw(Metric::QueueLength).await.unwrap().is_empty());
}

#[tokio::test]
async fn append_and_read_raw_by_metric() {
    let (_dir, store) = temp_store().await;
    store.append_raw(&queue_raw(at(2026, 10, 1, 10, 5), 7)).await.unwrap();
    store.append_raw(&queue_raw(at(2026, 10, 1, 10, 0), 3)).await.unwrap();
    store
        .append_raw(&delay_raw(at(2026, 10, 1, 10, 5), 60.0, 120.0, 2))
        .await
        .unwrap();

    let queue = store.get_all_raw(Metric::QueueLength).await.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].sample, queue_raw(at(2026, 10, 1, 10, 0), 3));
    assert_eq!(queue[1].sample, queue_raw(at(2026, 10, 1, 10, 5), 7));

    let delays = store.get_all_raw(Metric::ActionDelay).await.unwrap();
    assert_eq!(delays.len(), 1);
    assert_eq!(delays[0].sample, delay_raw(at(2026, 10, 1, 10, 5), 60.0, 120.0, 2));
}

#[tokio::test]
async fn range_and_before_bounds() {
    let (_dir, store) = temp_store().await;
    for min in [0, 5, 10, 15] {
        store.append_raw(&queue_raw(at(2026, 10, 1, 10, min), min)).await.unwrap();
    }
    let range = store
        .get_raw_range(Metric::QueueLength, at(2026, 10, 1, 10, 5), at(2026, 10, 1, 10, 10))
        .await
        .unwrap();
    assert_eq!(range.len(), 2);

    let before = store
        .get_raw_before(Metric::QueueLength, at(2026, 10, 1, 10, 10))
        .await
        .unwrap();
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|s| s.sample.timestamp() < at(2026, 10, 1, 10, 10)));
}

#[tokio::test]
async fn delete_raw_by_ids() {
    let (_dir, store) = temp_store().await;
    let a = store.append_raw(&queue_raw(at(2026, 10, 1, 10, 0), 1)).await.unwrap();
    let _b = store.append_raw(&queue_raw(at(2026, 10, 1, 10, 5), 2)).await.unwrap();
    let c = store.append_raw(&queue_raw(at(2026, 10, 1, 10, 10), 3)).await.unwrap();

    assert_eq!(store.delete_raw(&[a, c]).await.unwrap(), 2);
    let left = store.get_all_raw(Metric::QueueLength).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].sample, queue_raw(at(2026, 10, 1, 10, 5), 2));
}

#[tokio::test]
async fn put_hourly_replaces_same_bucket() {
    let (_dir, store) = temp_store().await;
    let start = at(2026, 10, 1, 10, 0);
    store
        .put_hourly(&hourly(Metric::QueueLength, "2026-10-01T10:00Z", start, 4))
        .await
        .unwrap();
    store
        .put_hourly(&hourly(Metric::QueueLength, "2026-10-01T10:00Z", start, 9))
        .await
        .unwrap();
    store
        .put_hourly(&hourly(Metric::ActionDelay, "2026-10-01T10:00Z", start, 1))
        .await
        .unwrap();

    let list = store.list_hourly(Metric::QueueLength).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].aggregate.sample_count, 9);
    let got = store
        .get_hourly(Metric::ActionDelay, "2026-10-01T10:00Z")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.aggregate.sample_count, 1);
    assert!(store.get_hourly(Metric::ActionDelay, "2026-10-01T11:00Z").await.unwrap().is_none());
}

#[tokio::test]
async fn commit_rollup_group_writes_and_deletes_together() {
    let (_dir, store) = temp_store().await;
    let a = store.append_raw(&queue_raw(at(2026, 10, 1, 10, 0), 4)).await.unwrap();
    let b = store.append_raw(&queue_raw(at(2026, 10, 1, 10, 5), 6)).await.unwrap();

    let h = hourly(Metric::QueueLength, "2026-10-01T10:00Z", at(2026, 10, 1, 10, 0), 2);
    store.commit_rollup_group(&h, &[a, b]).await.unwrap();

    assert!(store.get_all_raw(Metric::QueueLength).await.unwrap().is_empty());
    assert_eq!(store.list_hourly(Metric::QueueLength).await.unwrap(), vec![h]);
}

#[tokio::test]
async fn commit_rollup_group_rolls_back_when_raw_already_gone() {
    let (_dir, store) = temp_store().await;
    let a = store.append_raw(&queue_raw(at(2026, 10, 1, 10, 0), 4)).await.unwrap();
    let b = store.append_raw(&queue_raw(at(2026, 10, 1, 10, 5), 6)).await.unwrap();
    store.delete_raw(&[b]).await.unwrap();

    let h = hourly(Metric::QueueLength, "2026-10-01T10:00Z", at(2026, 10, 1, 10, 0), 2);
    assert!(store.commit_rollup_group(&h, &[a, b]).await.is_err());

    // Neither effect applied: no aggregate, raw row `a` still present.
    assert!(store.list_hourly(Metric::QueueLength).await.unwrap().is_empty());
    let left = store.get_all_raw(Metric::QueueLength).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, a);
}

#[tokio::test]
async fn load_series_merges_tiers_in_time_order() {
    let (_dir, store) = temp_store().await;
    store.append_raw(&queue_raw(at(2026, 10, 2, 9, 0), 3)).await.unwrap();
    store
        .put_hourly(&hourly(Metric::QueueLength, "2026-10-01T10:00Z", at(2026, 10, 1, 10, 0), 12))
        .await
        .unwrap();

    let series = store.load_series(Metric::QueueLength).await.unwrap();
    assert_eq!(series.len(), 2);
    assert!(matches!(series[0], SeriesEntry::Hourly(_)));
    assert!(matches!(series[1], SeriesEntry::Raw(RawSample::QueueLength(_))));
    assert_eq!(series[0].to_aggregated().sample_count, 12);
    assert_eq!(series[1].to_aggregated().mean_value, 3.0);
}

#[tokio::test]
async fn documents_create_update_and_settings() {
    let (_dir, store) = temp_store().await;
    let name = "modqueue-tools/queuestats";
    assert_eq!(store.fetch(name).await, DocumentLookup::NotFound);

    store.create(name, "first", "init", INITIAL_SETTINGS).await.unwrap();
    assert!(store.create(name, "again", "init", INITIAL_SETTINGS).await.is_err());
    store.update(name, "second", "refresh").await.unwrap();

    let DocumentLookup::Found(doc) = store.fetch(name).await else {
        panic!("document should exist");
    };
    assert_eq!(doc.content, "second");
    assert!(doc.settings.listed);
    assert_eq!(doc.settings.permission, Permission::MaintainersOnly);
}

#[tokio::test]
async fn update_missing_document_fails() {
    let (_dir, store) = temp_store().await;
    assert!(store.update("nope", "x", "y").await.is_err());
}
