use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use pipewatch_core::quality::QualityReport;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct EvaluateResponse {
    pub report: QualityReport,
    /// Where the report was written; `null` if persisting failed.
    pub report_path: Option<String>,
}

/// GET /quality/latest
async fn latest(State(state): State<AppState>) -> AppResult<Json<QualityReport>> {
    state
        .quality
        .latest()
        .map(|report| Json(report.as_ref().clone()))
        .ok_or_else(|| AppError::NotFound("No quality report has been produced yet".into()))
}

/// POST /quality/evaluate -- run an evaluation now.
async fn evaluate(State(state): State<AppState>) -> AppResult<Json<EvaluateResponse>> {
    let published = state.quality.run().await?;
    Ok(Json(EvaluateResponse {
        report: published.report.as_ref().clone(),
        report_path: published.path.map(|p| p.display().to_string()),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quality/latest", get(latest))
        .route("/quality/evaluate", post(evaluate))
}
