// GET handlers: version, report, queue

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use super::AppState;
use crate::report::DocumentLookup;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /report: the last published report as markdown.
pub(super) async fn report_handler(State(state): State<AppState>) -> axum::response::Response {
    let name = &state.config.report.document_name;
    match state.publisher.fetch(name).await {
        DocumentLookup::Found(doc) => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            doc.content,
        )
            .into_response(),
        DocumentLookup::NotFound => {
            (StatusCode::NOT_FOUND, "report not published yet").into_response()
        }
        DocumentLookup::TransientError(e) => {
            tracing::warn!(error = %e, operation = "fetch_report", "report lookup failed");
            (StatusCode::SERVICE_UNAVAILABLE, "report unavailable").into_response()
        }
    }
}

/// GET /queue: current queue length and items, oldest first.
pub(super) async fn queue_handler(State(state): State<AppState>) -> impl IntoResponse {
    let items = state.live_queue.snapshot();
    axum::Json(serde_json::json!({
        "queueLength": items.len(),
        "items": items,
    }))
}
