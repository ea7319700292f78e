use std::collections::BTreeMap;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::scheduler::WatcherStatus;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when any watcher's last cycle failed.
    pub status: &'static str,
    pub version: &'static str,
    pub watchers: BTreeMap<String, WatcherStatus>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.board.all_healthy() { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        watchers: state.board.snapshot(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
