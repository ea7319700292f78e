#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Duration as ChronoDuration;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pipewatch_core::alert::DedupPolicy;
use pipewatch_core::dataset::{CellValue, Column, ColumnKind, Dataset};
use pipewatch_core::quality::QualityRules;
use pipewatch_core::resources::ResourceUsage;
use pipewatch_core::runs::RunRecord;
use pipewatch_core::thresholds::ThresholdConfig;
use pipewatch_core::types::Timestamp;
use pipewatch_db::models::warehouse::VolumeStats;
use pipewatch_events::{AlertChannel, AlertDispatcher, AlertEvent, ChannelDeliveryError};
use pipewatch_monitor::alerting::AlertRelay;
use pipewatch_monitor::quality_service::QualityService;
use pipewatch_monitor::registry::MetricsRegistry;
use pipewatch_monitor::reports::ReportStore;
use pipewatch_monitor::router::build_app_router;
use pipewatch_monitor::scheduler::StatusBoard;
use pipewatch_monitor::sources::{ResourceProbe, RunSource, SampleError, WarehouseSource};
use pipewatch_monitor::state::AppState;
use pipewatch_monitor::watchers;

// ---------------------------------------------------------------------------
// Fake collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WarehouseState {
    dataset: Option<Dataset>,
    latest: Option<Timestamp>,
    volume: Option<VolumeStats>,
    unavailable: bool,
}

/// In-memory warehouse. Unset values answer as an empty table.
#[derive(Default)]
pub struct FakeWarehouse {
    state: Mutex<WarehouseState>,
}

impl FakeWarehouse {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_dataset(&self, dataset: Dataset) {
        self.state.lock().unwrap().dataset = Some(dataset);
    }

    pub fn set_latest(&self, latest: Option<Timestamp>) {
        self.state.lock().unwrap().latest = latest;
    }

    pub fn set_volume(&self, volume: VolumeStats) {
        self.state.lock().unwrap().volume = Some(volume);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    fn check(&self) -> Result<(), SampleError> {
        if self.state.lock().unwrap().unavailable {
            Err(SampleError::Unavailable("warehouse is down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WarehouseSource for FakeWarehouse {
    async fn latest_record_time(&self) -> Result<Option<Timestamp>, SampleError> {
        self.check()?;
        Ok(self.state.lock().unwrap().latest)
    }

    async fn volume(&self) -> Result<VolumeStats, SampleError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .volume
            .clone()
            .unwrap_or(VolumeStats {
                total_records: 0,
                earliest: None,
                latest: None,
            }))
    }

    async fn snapshot(&self) -> Result<Dataset, SampleError> {
        self.check()?;
        Ok(self.state.lock().unwrap().dataset.clone().unwrap_or_default())
    }
}

/// Probe returning a settable reading; `None` makes it unavailable.
pub struct FakeProbe {
    usage: Mutex<Option<ResourceUsage>>,
    pub calls: AtomicUsize,
}

impl FakeProbe {
    pub fn new(usage: Option<ResourceUsage>) -> Arc<Self> {
        Arc::new(Self {
            usage: Mutex::new(usage),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, usage: Option<ResourceUsage>) {
        *self.usage.lock().unwrap() = usage;
    }
}

#[async_trait]
impl ResourceProbe for FakeProbe {
    async fn sample(&self) -> Result<ResourceUsage, SampleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.usage
            .lock()
            .unwrap()
            .ok_or_else(|| SampleError::Unavailable("probe offline".into()))
    }
}

/// Run source returning a settable list.
#[derive(Default)]
pub struct FakeRuns {
    runs: Mutex<Vec<RunRecord>>,
}

impl FakeRuns {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, runs: Vec<RunRecord>) {
        *self.runs.lock().unwrap() = runs;
    }
}

#[async_trait]
impl RunSource for FakeRuns {
    async fn recent_runs(&self) -> Result<Vec<RunRecord>, SampleError> {
        Ok(self.runs.lock().unwrap().clone())
    }
}

/// Alert channel that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    pub messages: Mutex<Vec<String>>,
    pub subjects: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDeliveryError> {
        self.messages.lock().unwrap().push(event.message.clone());
        self.subjects.lock().unwrap().push(event.subject.clone());
        Ok(())
    }
}

/// Relay delivering to a single [`RecordingChannel`].
pub fn recording_relay(registry: &Arc<MetricsRegistry>) -> (AlertRelay, Arc<RecordingChannel>) {
    let channel = Arc::new(RecordingChannel::default());
    let channels: Vec<Arc<dyn AlertChannel>> = vec![channel.clone()];
    let relay = AlertRelay::new(AlertDispatcher::new(channels), Arc::clone(registry));
    (relay, channel)
}

pub fn test_registry() -> Arc<MetricsRegistry> {
    let registry = Arc::new(MetricsRegistry::new());
    watchers::register_metrics(&registry);
    registry
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// Clean hourly rental rows whose newest record is `age_hours` before `now`.
/// The first `broken_rows` rows violate the default sum invariant.
pub fn rental_dataset(rows: usize, broken_rows: usize, age_hours: i64, now: Timestamp) -> Dataset {
    let latest = now - ChronoDuration::hours(age_hours);
    let dates = (0..rows)
        .map(|i| CellValue::Timestamp(latest - ChronoDuration::hours((rows - 1 - i) as i64)))
        .collect();
    let casual: Vec<i64> = (0..rows).map(|i| (i % 5) as i64 * 2).collect();
    let registered: Vec<i64> = (0..rows).map(|i| (i % 9) as i64 * 4 + 3).collect();
    let total = (0..rows)
        .map(|i| {
            let offset = if i < broken_rows { 5 } else { 0 };
            CellValue::Integer(casual[i] + registered[i] + offset)
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
    ])
    .unwrap()
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub state: AppState,
    pub warehouse: Arc<FakeWarehouse>,
    pub alerts: Arc<RecordingChannel>,
}

/// State wired to a fake warehouse, writing reports under `reports_dir`.
pub fn build_test_state(reports_dir: &Path, dedup: DedupPolicy) -> TestApp {
    let registry = test_registry();
    let (relay, alerts) = recording_relay(&registry);
    let warehouse = FakeWarehouse::new();

    let quality = Arc::new(QualityService::new(
        warehouse.clone(),
        ThresholdConfig::default(),
        QualityRules::default(),
        Arc::clone(&registry),
        relay,
        ReportStore::new(reports_dir),
        dedup,
    ));

    TestApp {
        state: AppState {
            registry,
            board: Arc::new(StatusBoard::new()),
            quality,
        },
        warehouse,
        alerts,
    }
}

/// Full router with the production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, Duration::from_secs(30))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri).await
}

async fn send(app: Router, method: Method, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
