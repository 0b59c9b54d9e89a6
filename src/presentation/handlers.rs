// HTTP request handlers for the read-only status surface
use crate::application::collector::CollectorStatus;
use crate::presentation::app_state::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Counters, live window and spike cooldown of the running collector
pub async fn collector_status(State(state): State<Arc<AppState>>) -> Json<CollectorStatus> {
    Json(state.collector.status())
}
