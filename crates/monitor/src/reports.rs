//! Append-only JSON report files.
//!
//! Layout under the reports root:
//!
//! ```text
//! quality/quality_report_20240101_120000.json
//! health/monitoring_report_20240101_120000.json
//! ```
//!
//! Files are created exclusively. Two reports in the same second get `_1`,
//! `_2`, ... suffixes instead of overwriting each other. The body is written to
//! a hidden temp file first and hard-linked into place, so a report name never
//! points at a partial file.

use std::path::{Path, PathBuf};

use pipewatch_core::types::Timestamp;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const MAX_NAME_SUFFIX: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No free report file name for {0}")]
    NameExhausted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Quality,
    Health,
}

impl ReportKind {
    fn dir(self) -> &'static str {
        match self {
            ReportKind::Quality => "quality",
            ReportKind::Health => "health",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ReportKind::Quality => "quality_report",
            ReportKind::Health => "monitoring_report",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serialize `report` and write it to a new file named after `timestamp`.
    pub async fn write<T: Serialize>(
        &self,
        kind: ReportKind,
        timestamp: Timestamp,
        report: &T,
    ) -> Result<PathBuf, ReportError> {
        let body = serde_json::to_vec_pretty(report)?;
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;

        let stem = format!("{}_{}", kind.prefix(), timestamp.format("%Y%m%d_%H%M%S"));
        let staged = dir.join(format!(".{stem}.{}.tmp", Uuid::new_v4()));

        let result = match write_staged(&staged, &body).await {
            Ok(()) => publish(&dir, &stem, &staged).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = tokio::fs::remove_file(&staged).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %staged.display(), error = %e, "Failed to remove staged report");
            }
        }

        let path = result?;
        tracing::info!(path = %path.display(), "Report written");
        Ok(path)
    }
}

async fn write_staged(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.sync_all().await
}

/// Link `staged` under the first free report name.
async fn publish(dir: &Path, stem: &str, staged: &Path) -> Result<PathBuf, ReportError> {
    for attempt in 0..MAX_NAME_SUFFIX {
        let name = if attempt == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}_{attempt}.json")
        };
        let path = dir.join(name);

        match tokio::fs::hard_link(staged, &path).await {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(ReportError::NameExhausted(stem.to_string()))
}
