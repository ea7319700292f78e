use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};

use pipewatch_core::dataset::{CellValue, Column, ColumnKind, Dataset};
use pipewatch_core::error::CoreError;
use pipewatch_core::quality::{evaluate, QualityRules, SumInvariant};
use pipewatch_core::thresholds::{DimensionWeights, QualityThresholds, ThresholdConfig};
use pipewatch_core::types::Timestamp;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Hourly rental rows ending `age_hours` before [`now`].
///
/// `temperature_nulls` rows of the `temperature` column are null and
/// `broken_rows` rows violate `total_rentals = casual_users + registered_users`.
struct RentalFixture {
    rows: usize,
    temperature_nulls: usize,
    broken_rows: usize,
    age_hours: i64,
}

impl Default for RentalFixture {
    fn default() -> Self {
        Self {
            rows: 100,
            temperature_nulls: 0,
            broken_rows: 0,
            age_hours: 1,
        }
    }
}

impl RentalFixture {
    fn build(&self) -> Dataset {
        let latest = now() - Duration::hours(self.age_hours);
        let n = self.rows;

        let dates = (0..n)
            .map(|i| CellValue::Timestamp(latest - Duration::hours((n - 1 - i) as i64)))
            .collect();
        let casual: Vec<i64> = (0..n).map(|i| (i % 7) as i64 * 3).collect();
        let registered: Vec<i64> = (0..n).map(|i| (i % 11) as i64 * 5 + 10).collect();
        let total = (0..n)
            .map(|i| {
                let offset = if i < self.broken_rows { 1 } else { 0 };
                CellValue::Integer(casual[i] + registered[i] + offset)
            })
            .collect();
        let temperature = (0..n)
            .map(|i| {
                if i < self.temperature_nulls {
                    CellValue::Null
                } else {
                    CellValue::Float(15.0 + (i % 10) as f64 * 0.5)
                }
            })
            .collect();

        Dataset::new(vec![
            Column::new("date", ColumnKind::Timestamp, dates).unwrap(),
            Column::new("total_rentals", ColumnKind::Integer, total).unwrap(),
            Column::new(
                "casual_users",
                ColumnKind::Integer,
                casual.into_iter().map(CellValue::Integer).collect(),
            )
            .unwrap(),
            Column::new(
                "registered_users",
                ColumnKind::Integer,
                registered.into_iter().map(CellValue::Integer).collect(),
            )
            .unwrap(),
            Column::new("temperature", ColumnKind::Float, temperature).unwrap(),
            Column::new(
                "season",
                ColumnKind::Text,
                (0..n).map(|_| CellValue::Text("summer".into())).collect(),
            )
            .unwrap(),
        ])
        .unwrap()
    }
}

fn config_with(thresholds: QualityThresholds) -> ThresholdConfig {
    ThresholdConfig::new(thresholds, DimensionWeights::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn five_percent_nulls_is_complete() {
    let dataset = RentalFixture {
        temperature_nulls: 5,
        ..Default::default()
    }
    .build();
    let report = evaluate(
        &dataset,
        &ThresholdConfig::default(),
        &QualityRules::default(),
        now(),
    )
    .unwrap();

    let check = &report.metrics.completeness["temperature"];
    assert_eq!(check.null_count, 5);
    assert_eq!(check.null_percentage, 5.0);
    assert!(check.is_complete);
    assert_eq!(report.dimension_scores.completeness, 1.0);
}

#[test]
fn six_percent_nulls_is_incomplete() {
    let dataset = RentalFixture {
        temperature_nulls: 6,
        ..Default::default()
    }
    .build();
    let report = evaluate(
        &dataset,
        &ThresholdConfig::default(),
        &QualityRules::default(),
        now(),
    )
    .unwrap();

    let check = &report.metrics.completeness["temperature"];
    assert_eq!(check.null_percentage, 6.0);
    assert!(!check.is_complete);
    // One of six columns fails.
    assert!((report.dimension_scores.completeness - 5.0 / 6.0).abs() < 1e-12);
    assert!(report
        .issues()
        .contains(&"• temperature: 6% null values".to_string()));
}

#[test]
fn three_inconsistent_rows_within_threshold() {
    let dataset = RentalFixture {
        broken_rows: 3,
        ..Default::default()
    }
    .build();
    let report = evaluate(
        &dataset,
        &ThresholdConfig::default(),
        &QualityRules::default(),
        now(),
    )
    .unwrap();

    let check = &report.metrics.consistency["user_counts"];
    assert_eq!(check.inconsistent_rows, 3);
    assert_eq!(check.consistency_percentage, 97.0);
    assert!(check.is_consistent);
    assert_eq!(
        check.expression,
        "total_rentals = casual_users + registered_users"
    );
}

#[test]
fn stale_data_drops_score_below_alert_ceiling() {
    let dataset = RentalFixture {
        broken_rows: 3,
        age_hours: 30,
        ..Default::default()
    }
    .build();
    let report = evaluate(
        &dataset,
        &ThresholdConfig::default(),
        &QualityRules::default(),
        now(),
    )
    .unwrap();

    assert!(!report.metrics.timeliness.is_timely);
    assert_eq!(report.metrics.timeliness.hours_delay, 30.0);
    assert_eq!(report.dimension_scores.completeness, 1.0);
    assert_eq!(report.dimension_scores.accuracy, 1.0);
    assert_eq!(report.dimension_scores.timeliness, 0.0);
    // The single invariant passes at 97%, so consistency contributes fully.
    assert_eq!(report.dimension_scores.consistency, 1.0);
    assert_eq!(report.quality_score, 80.0);
    assert!(report.below_alert_threshold());

    let message = report.alert_message();
    assert!(message.contains("Quality Score: 80%"));
    assert!(message.contains("• Data delay: 30 hours"));
}

#[test]
fn zero_rows_is_empty_dataset_error() {
    let dataset = RentalFixture {
        rows: 0,
        ..Default::default()
    }
    .build();
    let result = evaluate(
        &dataset,
        &ThresholdConfig::default(),
        &QualityRules::default(),
        now(),
    );
    assert_matches!(result, Err(CoreError::EmptyDataset));
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

#[test]
fn completeness_boundary_is_inclusive() {
    let config = config_with(QualityThresholds {
        completeness: 0.9,
        ..Default::default()
    });

    let at_limit = RentalFixture {
        temperature_nulls: 10,
        ..Default::default()
    }
    .build();
    let report = evaluate(&at_limit, &config, &QualityRules::default(), now()).unwrap();
    assert!(report.metrics.completeness["temperature"].is_complete);

    let over = RentalFixture {
        temperature_nulls: 11,
        ..Default::default()
    }
    .build();
    let report = evaluate(&over, &config, &QualityRules::default(), now()).unwrap();
    assert!(!report.metrics.completeness["temperature"].is_complete);
}

#[test]
fn consistency_boundary_is_inclusive() {
    let config = config_with(QualityThresholds {
        consistency: 0.97,
        ..Default::default()
    });

    let at_limit = RentalFixture {
        broken_rows: 3,
        ..Default::default()
    }
    .build();
    let report = evaluate(&at_limit, &config, &QualityRules::default(), now()).unwrap();
    assert!(report.metrics.consistency["user_counts"].is_consistent);

    let over = RentalFixture {
        broken_rows: 4,
        ..Default::default()
    }
    .build();
    let report = evaluate(&over, &config, &QualityRules::default(), now()).unwrap();
    assert!(!report.metrics.consistency["user_counts"].is_consistent);
    assert_eq!(report.dimension_scores.consistency, 0.0);
}

#[test]
fn timeliness_boundary_is_inclusive() {
    let dataset = RentalFixture {
        age_hours: 24,
        ..Default::default()
    }
    .build();
    let report = evaluate(
        &dataset,
        &ThresholdConfig::default(),
        &QualityRules::default(),
        now(),
    )
    .unwrap();
    assert!(report.metrics.timeliness.is_timely);
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

#[test]
fn negative_counts_and_future_dates_are_inaccurate() {
    let later = now() + Duration::hours(2);
    let dataset = Dataset::new(vec![
        Column::new(
            "date",
            ColumnKind::Timestamp,
            vec![CellValue::Timestamp(now()), CellValue::Timestamp(later)],
        )
        .unwrap(),
        Column::new(
            "casual_users",
            ColumnKind::Integer,
            vec![CellValue::Integer(-3), CellValue::Integer(4)],
        )
        .unwrap(),
    ])
    .unwrap();
    let rules = QualityRules {
        timestamp_column: "date".into(),
        invariants: Vec::new(),
    };

    let report = evaluate(&dataset, &ThresholdConfig::default(), &rules, now()).unwrap();
    assert_eq!(report.metrics.accuracy["casual_users"].violations, 1);
    assert_eq!(report.metrics.accuracy["date"].violations, 1);
    assert_eq!(report.dimension_scores.accuracy, 0.0);
    // No invariants declared: consistency passes vacuously.
    assert_eq!(report.dimension_scores.consistency, 1.0);
    assert!(report
        .issues()
        .contains(&"• casual_users: 1 invalid values (negative)".to_string()));
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[test]
fn missing_timestamp_column_is_malformed() {
    let dataset = RentalFixture::default().build();
    let rules = QualityRules {
        timestamp_column: "dteday".into(),
        ..Default::default()
    };
    assert_matches!(
        evaluate(&dataset, &ThresholdConfig::default(), &rules, now()),
        Err(CoreError::MalformedDataset(_))
    );
}

#[test]
fn invariant_on_text_column_is_malformed() {
    let dataset = RentalFixture::default().build();
    let rules = QualityRules {
        invariants: vec![SumInvariant::new(
            "bad",
            "total_rentals",
            vec!["season".into(), "casual_users".into()],
        )],
        ..Default::default()
    };
    assert_matches!(
        evaluate(&dataset, &ThresholdConfig::default(), &rules, now()),
        Err(CoreError::MalformedDataset(msg)) if msg.contains("season")
    );
}

#[test]
fn null_in_invariant_column_counts_as_mismatch() {
    let dataset = Dataset::new(vec![
        Column::new(
            "date",
            ColumnKind::Timestamp,
            vec![CellValue::Timestamp(now()), CellValue::Timestamp(now())],
        )
        .unwrap(),
        Column::new(
            "t",
            ColumnKind::Integer,
            vec![CellValue::Integer(3), CellValue::Integer(3)],
        )
        .unwrap(),
        Column::new(
            "a",
            ColumnKind::Integer,
            vec![CellValue::Integer(1), CellValue::Null],
        )
        .unwrap(),
        Column::new(
            "b",
            ColumnKind::Float,
            vec![CellValue::Float(2.0), CellValue::Float(2.0)],
        )
        .unwrap(),
    ])
    .unwrap();
    let rules = QualityRules {
        timestamp_column: "date".into(),
        invariants: QualityRules::parse_invariants("t=a+b").unwrap(),
    };
    let report = evaluate(&dataset, &ThresholdConfig::default(), &rules, now()).unwrap();
    assert_eq!(report.metrics.consistency["t"].inconsistent_rows, 1);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn evaluation_is_deterministic() {
    let dataset = RentalFixture {
        temperature_nulls: 7,
        broken_rows: 9,
        age_hours: 40,
        ..Default::default()
    }
    .build();
    let config = ThresholdConfig::default();
    let rules = QualityRules::default();

    let a = evaluate(&dataset, &config, &rules, now()).unwrap();
    let b = evaluate(&dataset, &config, &rules, now()).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn score_stays_within_range_across_inputs() {
    let config = ThresholdConfig::default();
    let rules = QualityRules::default();
    for rows in [1usize, 2, 17, 100] {
        for nulls in [0usize, 1, rows / 2, rows] {
            for broken in [0usize, rows / 3, rows] {
                for age in [0i64, 24, 25, 1000] {
                    let dataset = RentalFixture {
                        rows,
                        temperature_nulls: nulls,
                        broken_rows: broken,
                        age_hours: age,
                    }
                    .build();
                    let report = evaluate(&dataset, &config, &rules, now()).unwrap();
                    assert!(
                        (0.0..=100.0).contains(&report.quality_score),
                        "score {} out of range",
                        report.quality_score
                    );
                }
            }
        }
    }
}

#[test]
fn report_carries_thresholds_in_effect() {
    let config = config_with(QualityThresholds {
        alert_ceiling: 0.5,
        ..Default::default()
    });
    let report = evaluate(
        &RentalFixture::default().build(),
        &config,
        &QualityRules::default(),
        now(),
    )
    .unwrap();
    assert_eq!(report.thresholds, config);
    assert_eq!(report.quality_score, 100.0);
    assert!(!report.below_alert_threshold());
}
