//! Collaborators the watchers sample from.
//!
//! Each seam is a small async trait so that watchers can be driven by the
//! real host, orchestrator, and warehouse in production and by fakes in tests.

pub mod airflow;
pub mod system;
pub mod warehouse;

use async_trait::async_trait;
use pipewatch_core::dataset::Dataset;
use pipewatch_core::error::CoreError;
use pipewatch_core::resources::ResourceUsage;
use pipewatch_core::runs::RunRecord;
use pipewatch_core::types::Timestamp;
use pipewatch_db::models::warehouse::VolumeStats;

pub use airflow::AirflowRunSource;
pub use system::SystemProbe;
pub use warehouse::PgWarehouse;

/// Why one sampling attempt produced no value.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// The collaborator could not be reached or the query failed.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered with data that cannot be used.
    #[error("Malformed sample: {0}")]
    Malformed(String),

    /// Quality evaluation rejected the snapshot.
    #[error(transparent)]
    Evaluation(#[from] CoreError),
}

/// Host CPU, memory, and disk usage.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn sample(&self) -> Result<ResourceUsage, SampleError>;
}

/// Recent orchestration runs.
#[async_trait]
pub trait RunSource: Send + Sync {
    async fn recent_runs(&self) -> Result<Vec<RunRecord>, SampleError>;
}

/// Read-only view of the warehouse table.
#[async_trait]
pub trait WarehouseSource: Send + Sync {
    /// Newest record time, `None` when the table is empty.
    async fn latest_record_time(&self) -> Result<Option<Timestamp>, SampleError>;

    async fn volume(&self) -> Result<VolumeStats, SampleError>;

    /// Full tabular snapshot for quality evaluation.
    async fn snapshot(&self) -> Result<Dataset, SampleError>;
}
