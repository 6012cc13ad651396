// Integration tests: HTTP endpoints over the live queue and the document store

mod common;

use axum_test::TestServer;
use common::{at, temp_store};
use queuestats::config::AppConfig;
use queuestats::live_queue::LiveQueue;
use queuestats::report::{DocumentPublisher, publish_report};
use queuestats::routes;
use queuestats::sample_store::SampleStore;
use std::sync::Arc;
use tempfile::TempDir;

const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[database]
path = "data/test.db"
max_pool_size = 2
"#;

struct Harness {
    _dir: TempDir,
    server: TestServer,
    store: Arc<SampleStore>,
    queue: Arc<LiveQueue>,
}

async fn harness() -> Harness {
    let (dir, store) = temp_store().await;
    let store = Arc::new(store);
    let queue = Arc::new(LiveQueue::new());
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    let app = routes::app(
        queue.clone(),
        store.clone() as Arc<dyn DocumentPublisher>,
        config,
    );
    Harness {
        _dir: dir,
        server: TestServer::new(app).unwrap(),
        store,
        queue,
    }
}

#[tokio::test]
async fn test_version_endpoint() {
    let h = harness().await;
    let response = h.server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("queuestats")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_report_not_found_until_published() {
    let h = harness().await;
    h.server
        .get("/report")
        .expect_failure()
        .await
        .assert_status_not_found();

    publish_report(
        &*h.store,
        "modqueue-tools/queuestats",
        "# Queue Statistics\n",
    )
    .await
    .unwrap();

    let response = h.server.get("/report").await;
    response.assert_status_ok();
    response.assert_text("# Queue Statistics\n");
}

#[tokio::test]
async fn test_events_update_queue() {
    let h = harness().await;
    h.server
        .post("/events/queued")
        .json(&serde_json::json!({
            "itemId": "t1_a",
            "postId": "t3_p",
            "queuedAt": "2026-10-19T10:00:00Z"
        }))
        .await
        .assert_status(axum::http::StatusCode::ACCEPTED);
    h.server
        .post("/events/queued")
        .json(&serde_json::json!({ "itemId": "t1_b", "postId": "t3_p" }))
        .await
        .assert_status(axum::http::StatusCode::ACCEPTED);

    let json: serde_json::Value = h.server.get("/queue").await.json();
    assert_eq!(json["queueLength"], 2);
    assert_eq!(json["items"][0]["itemId"], "t1_a");

    let handled = h
        .server
        .post("/events/handled")
        .json(&serde_json::json!({
            "itemId": "t1_a",
            "actor": "moderator",
            "handledAt": "2026-10-19T10:30:00Z"
        }))
        .await;
    handled.assert_status(axum::http::StatusCode::ACCEPTED);
    handled.assert_json(&serde_json::json!({ "recorded": true }));

    let unknown = h
        .server
        .post("/events/handled")
        .json(&serde_json::json!({ "itemId": "t1_zzz", "actor": "automated" }))
        .await;
    unknown.assert_status_ok();
    unknown.assert_json(&serde_json::json!({ "recorded": false }));

    assert_eq!(h.queue.len(), 1);
    let json: serde_json::Value = h.server.get("/queue").await.json();
    assert_eq!(json["queueLength"], 1);
    assert_eq!(json["items"][0]["itemId"], "t1_b");
}

#[tokio::test]
async fn test_handled_event_feeds_pending_batch() {
    use queuestats::sampler::QueueSource;

    let h = harness().await;
    h.queue.enqueue(common::item("t1_a", "t3_p", at(2026, 10, 19, 10, 0)));
    h.server
        .post("/events/handled")
        .json(&serde_json::json!({
            "itemId": "t1_a",
            "actor": "moderator",
            "handledAt": "2026-10-19T10:02:00Z"
        }))
        .await
        .assert_status(axum::http::StatusCode::ACCEPTED);

    let batch = h.queue.drain_handled().await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].delay_secs, 120.0);
}
