// HTTP routes: queue item events in, report and queue state out

mod events;
mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::live_queue::LiveQueue;
use crate::report::DocumentPublisher;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) live_queue: Arc<LiveQueue>,
    pub(crate) publisher: Arc<dyn DocumentPublisher>,
    pub(crate) config: AppConfig,
}

pub fn app(
    live_queue: Arc<LiveQueue>,
    publisher: Arc<dyn DocumentPublisher>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        live_queue,
        publisher,
        config,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/report", get(http::report_handler)) // GET /report
        .route("/queue", get(http::queue_handler)) // GET /queue
        .route("/events/queued", post(events::queued_handler)) // POST /events/queued
        .route("/events/handled", post(events::handled_handler)) // POST /events/handled
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
