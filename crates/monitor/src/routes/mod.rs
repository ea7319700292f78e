pub mod health;
pub mod metrics;
pub mod quality;

use axum::Router;

use crate::state::AppState;

/// All routes, unlayered.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(metrics::router())
        .merge(quality::router())
}
