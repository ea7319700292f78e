use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pipewatch_core::error::CoreError;
use serde_json::json;

use crate::sources::SampleError;

/// Error type for HTTP handlers, rendered as `{"error": ..., "code": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("{0}")]
    NotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Sample(sample) => match sample {
                SampleError::Evaluation(CoreError::EmptyDataset) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EMPTY_DATASET",
                    sample.to_string(),
                ),
                SampleError::Evaluation(CoreError::MalformedDataset(_))
                | SampleError::Malformed(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "MALFORMED_DATASET",
                    sample.to_string(),
                ),
                SampleError::Unavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SOURCE_UNAVAILABLE",
                    sample.to_string(),
                ),
                SampleError::Evaluation(CoreError::ConfigValidation(msg)) => {
                    tracing::error!(error = %msg, "Quality configuration rejected at evaluation");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
