// Router for the status server
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{collector_status, health_check};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn status_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/status", get(collector_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
