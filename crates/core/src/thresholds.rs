//! Quality thresholds and dimension weights.
//!
//! [`ThresholdConfig`] is built once at startup and never mutated. Every
//! constructor validates, so holding a `ThresholdConfig` is proof that the
//! ranges are sane and the weights sum to one.

use serde::Serialize;
use validator::Validate;

use crate::error::CoreError;
use crate::threshold_validation::{validate_positive, validate_unit_range};

/// Allowed drift of the weight sum away from exactly 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// One axis of data quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Completeness,
    Accuracy,
    Timeliness,
    Consistency,
}

impl Dimension {
    /// All dimensions in scoring order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Completeness,
        Dimension::Accuracy,
        Dimension::Timeliness,
        Dimension::Consistency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Completeness => "completeness",
            Dimension::Accuracy => "accuracy",
            Dimension::Timeliness => "timeliness",
            Dimension::Consistency => "consistency",
        }
    }
}

/// Per-dimension pass thresholds plus the alert ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct QualityThresholds {
    /// Minimum fraction of non-null values per column.
    #[validate(range(min = 0.0, max = 1.0))]
    pub completeness: f64,
    /// Recorded in reports; accuracy checks are strict and do not use it.
    #[validate(range(min = 0.0, max = 1.0))]
    pub accuracy: f64,
    /// Maximum age of the newest record, in hours.
    #[validate(range(exclusive_min = 0.0))]
    pub timeliness_hours: f64,
    /// Minimum fraction of rows satisfying each invariant.
    #[validate(range(min = 0.0, max = 1.0))]
    pub consistency: f64,
    /// An alert fires when the overall score drops below this fraction of 100.
    #[validate(range(min = 0.0, max = 1.0))]
    pub alert_ceiling: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            completeness: 0.95,
            accuracy: 0.90,
            timeliness_hours: 24.0,
            consistency: 0.95,
            alert_ceiling: 0.90,
        }
    }
}

/// Relative weight of each dimension in the overall score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionWeights {
    pub completeness: f64,
    pub accuracy: f64,
    pub timeliness: f64,
    pub consistency: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            completeness: 0.30,
            accuracy: 0.30,
            timeliness: 0.20,
            consistency: 0.20,
        }
    }
}

impl DimensionWeights {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Completeness => self.completeness,
            Dimension::Accuracy => self.accuracy,
            Dimension::Timeliness => self.timeliness,
            Dimension::Consistency => self.consistency,
        }
    }

    /// Each weight must lie in `[0, 1]` and together they must sum to 1.
    pub fn check(&self) -> Result<(), CoreError> {
        for dimension in Dimension::ALL {
            validate_unit_range(
                self.weight(dimension),
                &format!("{} weight", dimension.as_str()),
            )?;
        }
        let sum: f64 = Dimension::ALL.iter().map(|d| self.weight(*d)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(CoreError::ConfigValidation(format!(
                "dimension weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Validated, immutable quality threshold configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdConfig {
    thresholds: QualityThresholds,
    weights: DimensionWeights,
}

impl ThresholdConfig {
    /// Build a configuration, failing fast on any out-of-range value.
    pub fn new(thresholds: QualityThresholds, weights: DimensionWeights) -> Result<Self, CoreError> {
        Validate::validate(&thresholds)
            .map_err(|e| CoreError::ConfigValidation(e.to_string()))?;
        // The derive accepts NaN, so check finiteness separately.
        validate_unit_range(thresholds.completeness, "completeness threshold")?;
        validate_unit_range(thresholds.accuracy, "accuracy threshold")?;
        validate_unit_range(thresholds.consistency, "consistency threshold")?;
        validate_unit_range(thresholds.alert_ceiling, "alert threshold")?;
        validate_positive(thresholds.timeliness_hours, "timeliness threshold")?;
        weights.check()?;
        Ok(Self {
            thresholds,
            weights,
        })
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn weights(&self) -> &DimensionWeights {
        &self.weights
    }

    /// Score (0-100) below which a quality alert fires.
    pub fn alert_score(&self) -> f64 {
        self.thresholds.alert_ceiling * 100.0
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            weights: DimensionWeights::default(),
        }
    }
}
