//! Warehouse aggregates.

use serde::Serialize;
use sqlx::FromRow;
use pipewatch_core::types::Timestamp;

/// Row count and time span of the warehouse table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct VolumeStats {
    pub total_records: i64,
    pub earliest: Option<Timestamp>,
    pub latest: Option<Timestamp>,
}

impl VolumeStats {
    /// Seconds between the earliest and latest record, if both exist.
    pub fn span_seconds(&self) -> Option<f64> {
        match (self.earliest, self.latest) {
            (Some(earliest), Some(latest)) => {
                Some(latest.signed_duration_since(earliest).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}
