//! PostgreSQL-backed warehouse source.

use async_trait::async_trait;
use pipewatch_core::dataset::Dataset;
use pipewatch_core::types::Timestamp;
use pipewatch_db::models::warehouse::VolumeStats;
use pipewatch_db::repositories::WarehouseRepo;
use pipewatch_db::{DbError, DbPool};

use super::{SampleError, WarehouseSource};

impl From<DbError> for SampleError {
    fn from(err: DbError) -> Self {
        if err.is_connectivity() {
            SampleError::Unavailable(err.to_string())
        } else {
            SampleError::Malformed(err.to_string())
        }
    }
}

/// Warehouse table reached through the shared pool.
#[derive(Clone)]
pub struct PgWarehouse {
    pool: DbPool,
    table: String,
    timestamp_column: String,
    snapshot_query: String,
}

impl PgWarehouse {
    pub fn new(
        pool: DbPool,
        table: impl Into<String>,
        timestamp_column: impl Into<String>,
        snapshot_query: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            table: table.into(),
            timestamp_column: timestamp_column.into(),
            snapshot_query: snapshot_query.into(),
        }
    }
}

#[async_trait]
impl WarehouseSource for PgWarehouse {
    async fn latest_record_time(&self) -> Result<Option<Timestamp>, SampleError> {
        Ok(WarehouseRepo::latest_timestamp(&self.pool, &self.table, &self.timestamp_column).await?)
    }

    async fn volume(&self) -> Result<VolumeStats, SampleError> {
        Ok(WarehouseRepo::volume_stats(&self.pool, &self.table, &self.timestamp_column).await?)
    }

    async fn snapshot(&self) -> Result<Dataset, SampleError> {
        Ok(WarehouseRepo::load_snapshot(&self.pool, &self.snapshot_query).await?)
    }
}
