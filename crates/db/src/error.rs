use pipewatch_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Column '{column}' has unsupported type {type_name}; cast it in the snapshot query")]
    UnsupportedColumn { column: String, type_name: String },

    #[error("Invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DbError {
    /// Whether the failure came from the connection or the server rather
    /// than from the shape of the data.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, DbError::Query(_))
    }
}
