use std::sync::Arc;

use crate::quality_service::QualityService;
use crate::registry::MetricsRegistry;
use crate::scheduler::StatusBoard;

/// Shared state available to handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricsRegistry>,
    pub board: Arc<StatusBoard>,
    pub quality: Arc<QualityService>,
}
