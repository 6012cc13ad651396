// POST handlers: items entering and leaving the review queue

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::AppState;
use crate::models::{ActorKind, QueueItem};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct QueuedEvent {
    item_id: String,
    post_id: String,
    queued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HandledEvent {
    item_id: String,
    actor: ActorKind,
    handled_at: Option<DateTime<Utc>>,
}

/// POST /events/queued: an item was reported or otherwise entered the queue.
pub(super) async fn queued_handler(
    State(state): State<AppState>,
    Json(event): Json<QueuedEvent>,
) -> impl IntoResponse {
    state.live_queue.enqueue(QueueItem {
        item_id: event.item_id,
        post_id: event.post_id,
        queued_at: event.queued_at.unwrap_or_else(Utc::now),
    });
    StatusCode::ACCEPTED
}

/// POST /events/handled: an item was approved or removed. Unknown items are ignored.
pub(super) async fn handled_handler(
    State(state): State<AppState>,
    Json(event): Json<HandledEvent>,
) -> impl IntoResponse {
    let handled_at = event.handled_at.unwrap_or_else(Utc::now);
    match state
        .live_queue
        .resolve(&event.item_id, event.actor, handled_at)
    {
        Some(action) => {
            tracing::debug!(
                item_id = %action.item_id,
                delay_secs = action.delay_secs,
                "queue item handled"
            );
            (StatusCode::ACCEPTED, Json(serde_json::json!({ "recorded": true })))
        }
        None => (StatusCode::OK, Json(serde_json::json!({ "recorded": false }))),
    }
}
