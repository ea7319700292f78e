#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("Dataset contains no rows")]
    EmptyDataset,

    #[error("Malformed dataset: {0}")]
    MalformedDataset(String),
}
