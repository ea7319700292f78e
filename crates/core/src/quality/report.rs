//! Quality report types.
//!
//! A [`QualityReport`] is produced once per evaluation and never mutated.
//! Every check is an explicit record (measured value + pass flag); a failing
//! check is data, not an error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::thresholds::{Dimension, ThresholdConfig};
use crate::types::Timestamp;

/// Null ratio of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessCheck {
    pub null_count: usize,
    /// Rounded to two decimals for display; the pass flag uses the exact ratio.
    pub null_percentage: f64,
    pub is_complete: bool,
}

/// Which accuracy rule a column was held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyRule {
    /// Numeric columns: no value below zero.
    NonNegative,
    /// The designated timestamp column: no value after evaluation time.
    NotInFuture,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyCheck {
    pub rule: AccuracyRule,
    pub violations: usize,
    pub is_accurate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinessCheck {
    pub latest_record: Timestamp,
    pub hours_delay: f64,
    pub is_timely: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyCheck {
    pub expression: String,
    pub inconsistent_rows: usize,
    pub consistency_percentage: f64,
    pub is_consistent: bool,
}

/// Per-check breakdown, keyed by column or invariant name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub completeness: BTreeMap<String, CompletenessCheck>,
    pub accuracy: BTreeMap<String, AccuracyCheck>,
    pub timeliness: TimelinessCheck,
    pub consistency: BTreeMap<String, ConsistencyCheck>,
}

/// Fraction of passing checks per dimension, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionScores {
    pub completeness: f64,
    pub accuracy: f64,
    pub timeliness: f64,
    pub consistency: f64,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Completeness => self.completeness,
            Dimension::Accuracy => self.accuracy,
            Dimension::Timeliness => self.timeliness,
            Dimension::Consistency => self.consistency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub timestamp: Timestamp,
    pub row_count: usize,
    /// Weighted composite in `[0, 100]`, two decimals.
    pub quality_score: f64,
    pub dimension_scores: DimensionScores,
    pub metrics: QualityMetrics,
    /// The configuration this report was scored against.
    pub thresholds: ThresholdConfig,
}

impl QualityReport {
    /// Whether the score is low enough to page someone.
    pub fn below_alert_threshold(&self) -> bool {
        self.quality_score < self.thresholds.alert_score()
    }

    /// One human-readable line per failing check.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (column, check) in &self.metrics.completeness {
            if !check.is_complete {
                issues.push(format!("• {column}: {}% null values", check.null_percentage));
            }
        }

        for (column, check) in &self.metrics.accuracy {
            if !check.is_accurate {
                let rule = match check.rule {
                    AccuracyRule::NonNegative => "negative",
                    AccuracyRule::NotInFuture => "in the future",
                };
                issues.push(format!(
                    "• {column}: {} invalid values ({rule})",
                    check.violations
                ));
            }
        }

        if !self.metrics.timeliness.is_timely {
            issues.push(format!(
                "• Data delay: {} hours",
                self.metrics.timeliness.hours_delay
            ));
        }

        for (name, check) in &self.metrics.consistency {
            if !check.is_consistent {
                issues.push(format!(
                    "• {name}: {} inconsistent rows",
                    check.inconsistent_rows
                ));
            }
        }

        issues
    }

    /// Alert body for a below-threshold report.
    pub fn alert_message(&self) -> String {
        let issues = self.issues();
        let issues = if issues.is_empty() {
            "(no individual check failed)".to_string()
        } else {
            issues.join("\n")
        };
        format!(
            "Data Quality Alert\n\nQuality Score: {}%\nThreshold: {}%\n\nIssues Found:\n{issues}\n\nPlease investigate the data quality issues.",
            self.quality_score,
            self.thresholds.alert_score(),
        )
    }
}
