//! Data quality scoring.
//!
//! [`evaluate`] scores a [`Dataset`](crate::dataset::Dataset) on four
//! dimensions and returns an immutable [`QualityReport`].

mod evaluator;
mod report;
mod rules;

pub use evaluator::evaluate;
pub use report::{
    AccuracyCheck, AccuracyRule, CompletenessCheck, ConsistencyCheck, DimensionScores,
    QualityMetrics, QualityReport, TimelinessCheck,
};
pub use rules::{QualityRules, SumInvariant, DEFAULT_INVARIANTS, DEFAULT_TIMESTAMP_COLUMN};
