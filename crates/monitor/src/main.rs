use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use pipewatch_core::runs::RunTracker;
use pipewatch_events::{
    AlertChannel, AlertDispatcher, EmailChannel, EmailDelivery, WebhookChannel, WebhookDelivery,
};
use pipewatch_monitor::alerting::AlertRelay;
use pipewatch_monitor::config::MonitorConfig;
use pipewatch_monitor::quality_service::QualityService;
use pipewatch_monitor::registry::MetricsRegistry;
use pipewatch_monitor::reports::ReportStore;
use pipewatch_monitor::router::build_app_router;
use pipewatch_monitor::scheduler::{Scheduler, StatusBoard};
use pipewatch_monitor::sources::{AirflowRunSource, PgWarehouse, SystemProbe, WarehouseSource};
use pipewatch_monitor::state::AppState;
use pipewatch_monitor::watchers::{
    self, FreshnessWatcher, HealthReporter, QualityWatcher, ResourceWatcher, RunWatcher,
    ThroughputWatcher,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = MonitorConfig::from_env();
    init_tracing(config.as_ref().map(|c| c.log_json).unwrap_or(false));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Monitor failed");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipewatch=info,tower_http=info".into()),
        )
        .with(fmt_layer)
        .init();
}

fn build_dispatcher(config: &MonitorConfig) -> Result<AlertDispatcher, String> {
    let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();

    if let Some(url) = &config.webhook_url {
        let delivery = WebhookDelivery::new(url.clone()).map_err(|e| e.to_string())?;
        channels.push(Arc::new(WebhookChannel::new(delivery)));
    }
    if let Some(email) = &config.email {
        let delivery = EmailDelivery::new(email).map_err(|e| e.to_string())?;
        tracing::info!(recipients = delivery.recipient_count(), "Email alerts enabled");
        channels.push(Arc::new(EmailChannel::new(delivery)));
    }

    let dispatcher = AlertDispatcher::new(channels);
    if dispatcher.channel_names().is_empty() {
        tracing::warn!("No alert channels configured; alerts will only be logged");
    } else {
        tracing::info!(channels = ?dispatcher.channel_names(), "Alert channels configured");
    }
    Ok(dispatcher)
}

async fn run(config: MonitorConfig) -> Result<(), String> {
    // Lazy so that an unreachable warehouse degrades watchers instead of
    // preventing startup.
    let pool = pipewatch_db::create_lazy_pool(&config.warehouse.database_url)
        .map_err(|e| format!("Invalid DATABASE_URL: {e}"))?;
    match pipewatch_db::health_check(&pool).await {
        Ok(()) => tracing::info!("Warehouse connection check passed"),
        Err(e) => tracing::warn!(error = %e, "Warehouse unreachable at startup; watchers will retry"),
    }
    let warehouse: Arc<dyn WarehouseSource> = Arc::new(PgWarehouse::new(
        pool,
        config.warehouse.table.clone(),
        config.warehouse.timestamp_column.clone(),
        config.warehouse.snapshot_query.clone(),
    ));

    let registry = Arc::new(MetricsRegistry::new());
    watchers::register_metrics(&registry);
    let board = Arc::new(StatusBoard::new());

    let relay = AlertRelay::new(build_dispatcher(&config)?, Arc::clone(&registry));
    let store = ReportStore::new(config.reports_dir.clone());
    tracing::info!(reports_dir = %store.root().display(), "Report directory configured");

    let quality = Arc::new(QualityService::new(
        Arc::clone(&warehouse),
        config.quality.clone(),
        config.rules.clone(),
        Arc::clone(&registry),
        relay.clone(),
        store.clone(),
        config.dedup,
    ));

    // --- Watchers ---
    let mut scheduler = Scheduler::new(Arc::clone(&registry), Arc::clone(&board));
    let intervals = config.intervals;

    scheduler.spawn(
        ResourceWatcher::new(
            Arc::new(SystemProbe::new(config.disk_path.clone())),
            config.resources.clone(),
            Arc::clone(&registry),
            relay.clone(),
            config.dedup,
        ),
        intervals.resource,
    );

    match &config.airflow {
        Some(airflow) => {
            let source = AirflowRunSource::new(
                airflow.base_url.clone(),
                airflow.auth.clone(),
                airflow.window,
            )
            .map_err(|e| format!("Failed to build Airflow client: {e}"))?;
            scheduler.spawn(
                RunWatcher::new(
                    Arc::new(source),
                    RunTracker::new(airflow.window),
                    Arc::clone(&registry),
                    relay.clone(),
                ),
                intervals.runs,
            );
        }
        None => tracing::info!("AIRFLOW_BASE_URL not set; run watcher disabled"),
    }

    scheduler.spawn(
        FreshnessWatcher::new(
            Arc::clone(&warehouse),
            config.freshness_threshold_hours,
            Arc::clone(&registry),
            relay.clone(),
            config.dedup,
        ),
        intervals.freshness,
    );
    scheduler.spawn(
        ThroughputWatcher::new(Arc::clone(&warehouse), Arc::clone(&registry)),
        intervals.throughput,
    );
    scheduler.spawn(QualityWatcher::new(Arc::clone(&quality)), intervals.quality);
    scheduler.spawn(
        HealthReporter::new(Arc::clone(&registry), Arc::clone(&board), store),
        intervals.health_report,
    );
    tracing::info!(watchers = scheduler.watcher_count(), "Scheduler started");

    // --- HTTP ---
    let state = AppState {
        registry,
        board,
        quality,
    };
    let app = build_app_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let host = config
        .server
        .host
        .parse::<IpAddr>()
        .map_err(|e| format!("Invalid HOST {:?}: {e}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;
    tracing::info!(%addr, "Serving /metrics, /health and /quality");

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!("Server stopped accepting connections, stopping watchers");
    scheduler
        .shutdown(Duration::from_secs(config.server.shutdown_timeout_secs))
        .await;
    tracing::info!("Graceful shutdown complete");

    server_result.map_err(|e| format!("Server error: {e}"))
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
