use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{routing::get, Router};

use crate::exposition;
use crate::state::AppState;

/// GET /metrics -- Prometheus text exposition.
async fn scrape(State(state): State<AppState>) -> impl IntoResponse {
    let body = exposition::render(&state.registry.snapshot());
    ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(scrape))
}
