pub mod alert;
pub mod dataset;
pub mod error;
pub mod metric_names;
pub mod quality;
pub mod resources;
pub mod runs;
pub mod threshold_validation;
pub mod thresholds;
pub mod types;
