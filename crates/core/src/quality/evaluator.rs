//! Quality evaluation.
//!
//! Pure logic: the caller supplies the dataset, the configuration, and the
//! evaluation time. Identical inputs always yield an identical report.

use std::collections::BTreeMap;

use crate::dataset::{Column, ColumnKind, Dataset};
use crate::error::CoreError;
use crate::quality::report::{
    AccuracyCheck, AccuracyRule, CompletenessCheck, ConsistencyCheck, DimensionScores,
    QualityMetrics, QualityReport, TimelinessCheck,
};
use crate::quality::rules::{QualityRules, SumInvariant};
use crate::thresholds::{Dimension, ThresholdConfig};
use crate::types::Timestamp;

/// Slack applied to inclusive comparisons so that float representation of
/// thresholds such as `1 - 0.9` never moves a boundary.
const BOUNDARY_EPSILON: f64 = 1e-9;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score `dataset` against `config`.
///
/// Fails with [`CoreError::EmptyDataset`] on a zero-row snapshot and with
/// [`CoreError::MalformedDataset`] when the timestamp column or an invariant
/// column is missing or unusable. Threshold violations are reported in the
/// returned record, never as errors.
pub fn evaluate(
    dataset: &Dataset,
    config: &ThresholdConfig,
    rules: &QualityRules,
    now: Timestamp,
) -> Result<QualityReport, CoreError> {
    let rows = dataset.row_count();
    if rows == 0 {
        return Err(CoreError::EmptyDataset);
    }

    let ts_column = timestamp_column(dataset, &rules.timestamp_column)?;
    let thresholds = config.thresholds();

    let completeness: BTreeMap<String, CompletenessCheck> = dataset
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), check_completeness(c, rows, thresholds.completeness)))
        .collect();

    let mut accuracy: BTreeMap<String, AccuracyCheck> = dataset
        .columns()
        .iter()
        .filter(|c| c.kind().is_numeric())
        .map(|c| (c.name().to_string(), check_non_negative(c)))
        .collect();
    accuracy.insert(ts_column.name().to_string(), check_not_in_future(ts_column, now));

    let timeliness = check_timeliness(ts_column, now, thresholds.timeliness_hours)?;

    let consistency = rules
        .invariants
        .iter()
        .map(|inv| {
            check_consistency(dataset, inv, thresholds.consistency).map(|c| (inv.name.clone(), c))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let dimension_scores = DimensionScores {
        completeness: pass_rate(completeness.values().map(|c| c.is_complete)),
        accuracy: pass_rate(accuracy.values().map(|c| c.is_accurate)),
        timeliness: if timeliness.is_timely { 1.0 } else { 0.0 },
        consistency: pass_rate(consistency.values().map(|c| c.is_consistent)),
    };

    let weights = config.weights();
    let raw_score: f64 = Dimension::ALL
        .iter()
        .map(|d| weights.weight(*d) * dimension_scores.get(*d) * 100.0)
        .sum();
    let quality_score = round2(raw_score).clamp(0.0, 100.0);

    Ok(QualityReport {
        timestamp: now,
        row_count: rows,
        quality_score,
        dimension_scores,
        metrics: QualityMetrics {
            completeness,
            accuracy,
            timeliness,
            consistency,
        },
        thresholds: config.clone(),
    })
}

fn timestamp_column<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Column, CoreError> {
    let column = dataset.column(name).ok_or_else(|| {
        CoreError::MalformedDataset(format!("timestamp column '{name}' is missing"))
    })?;
    if column.kind() != ColumnKind::Timestamp {
        return Err(CoreError::MalformedDataset(format!(
            "column '{name}' is {:?}, expected a timestamp",
            column.kind()
        )));
    }
    Ok(column)
}

/// Fraction of `true` flags; an empty dimension passes vacuously.
fn pass_rate(flags: impl Iterator<Item = bool>) -> f64 {
    let (passed, total) = flags.fold((0usize, 0usize), |(p, t), ok| (p + usize::from(ok), t + 1));
    if total == 0 {
        1.0
    } else {
        passed as f64 / total as f64
    }
}

fn check_completeness(column: &Column, rows: usize, threshold: f64) -> CompletenessCheck {
    let null_count = column.null_count();
    let null_percentage = null_count as f64 / rows as f64 * 100.0;
    let allowed = (1.0 - threshold) * 100.0;
    CompletenessCheck {
        null_count,
        null_percentage: round2(null_percentage),
        is_complete: null_percentage <= allowed + BOUNDARY_EPSILON,
    }
}

fn check_non_negative(column: &Column) -> AccuracyCheck {
    let violations = column
        .values()
        .iter()
        .filter_map(|v| v.as_f64())
        .filter(|v| *v < 0.0)
        .count();
    AccuracyCheck {
        rule: AccuracyRule::NonNegative,
        violations,
        is_accurate: violations == 0,
    }
}

fn check_not_in_future(column: &Column, now: Timestamp) -> AccuracyCheck {
    let violations = column
        .values()
        .iter()
        .filter_map(|v| v.as_timestamp())
        .filter(|ts| *ts > now)
        .count();
    AccuracyCheck {
        rule: AccuracyRule::NotInFuture,
        violations,
        is_accurate: violations == 0,
    }
}

fn check_timeliness(
    column: &Column,
    now: Timestamp,
    threshold_hours: f64,
) -> Result<TimelinessCheck, CoreError> {
    let latest = column.max_timestamp().ok_or_else(|| {
        CoreError::MalformedDataset(format!(
            "timestamp column '{}' contains only nulls",
            column.name()
        ))
    })?;
    let hours_delay = now.signed_duration_since(latest).num_milliseconds() as f64 / MILLIS_PER_HOUR;
    Ok(TimelinessCheck {
        latest_record: latest,
        hours_delay: round2(hours_delay),
        is_timely: hours_delay <= threshold_hours + BOUNDARY_EPSILON,
    })
}

fn numeric_column<'a>(
    dataset: &'a Dataset,
    name: &str,
    invariant: &SumInvariant,
) -> Result<&'a Column, CoreError> {
    let column = dataset.column(name).ok_or_else(|| {
        CoreError::MalformedDataset(format!(
            "invariant '{}' needs missing column '{name}'",
            invariant.name
        ))
    })?;
    if !column.kind().is_numeric() {
        return Err(CoreError::MalformedDataset(format!(
            "invariant '{}' needs numeric column '{name}'",
            invariant.name
        )));
    }
    Ok(column)
}

fn check_consistency(
    dataset: &Dataset,
    invariant: &SumInvariant,
    threshold: f64,
) -> Result<ConsistencyCheck, CoreError> {
    let total = numeric_column(dataset, &invariant.total, invariant)?;
    let parts = invariant
        .parts
        .iter()
        .map(|p| numeric_column(dataset, p, invariant))
        .collect::<Result<Vec<_>, _>>()?;

    let rows = dataset.row_count();
    let inconsistent_rows = (0..rows)
        .filter(|&row| {
            let expected = total.values()[row].as_f64();
            let sum = parts
                .iter()
                .map(|c| c.values()[row].as_f64())
                .sum::<Option<f64>>();
            match (expected, sum) {
                (Some(expected), Some(sum)) => (expected - sum).abs() > BOUNDARY_EPSILON,
                // A null on either side cannot satisfy the invariant.
                _ => true,
            }
        })
        .count();

    let consistency_percentage = (1.0 - inconsistent_rows as f64 / rows as f64) * 100.0;
    Ok(ConsistencyCheck {
        expression: invariant.to_string(),
        inconsistent_rows,
        consistency_percentage: round2(consistency_percentage),
        is_consistent: consistency_percentage >= threshold * 100.0 - BOUNDARY_EPSILON,
    })
}
