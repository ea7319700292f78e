//! Process configuration loaded from environment variables.
//!
//! Every variable has a default except `DATABASE_URL`. Any value that fails to
//! parse or validate aborts startup with a [`ConfigError`] naming the variable.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pipewatch_core::alert::{DedupPolicy, DEFAULT_ALERT_COOLDOWN};
use pipewatch_core::error::CoreError;
use pipewatch_core::quality::{QualityRules, DEFAULT_INVARIANTS, DEFAULT_TIMESTAMP_COLUMN};
use pipewatch_core::resources::{ResourceThresholds, DEFAULT_RESOURCE_CEILING};
use pipewatch_core::runs::DEFAULT_RUN_WINDOW;
use pipewatch_core::threshold_validation::validate_positive;
use pipewatch_core::thresholds::{DimensionWeights, QualityThresholds, ThresholdConfig};
use pipewatch_db::repositories::warehouse_repo::{
    default_snapshot_query, validate_column, validate_table,
};
use pipewatch_events::delivery::email::{
    EmailConfig, DEFAULT_FROM_ADDRESS, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT,
};

use crate::sources::airflow::AirflowAuth;
use crate::watchers::freshness::DEFAULT_FRESHNESS_THRESHOLD_HOURS;

const DEFAULT_WAREHOUSE_TABLE: &str = "fct_hourly_rentals";
const DEFAULT_REPORTS_DIR: &str = "monitoring_reports";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var}: {source}")]
    Validation {
        var: &'static str,
        #[source]
        source: CoreError,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub database_url: String,
    pub table: String,
    pub timestamp_column: String,
    pub snapshot_query: String,
}

/// Sampling interval of each watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchIntervals {
    pub resource: Duration,
    pub runs: Duration,
    pub freshness: Duration,
    pub throughput: Duration,
    pub quality: Duration,
    pub health_report: Duration,
}

impl Default for WatchIntervals {
    fn default() -> Self {
        Self {
            resource: Duration::from_secs(60),
            runs: Duration::from_secs(300),
            freshness: Duration::from_secs(3600),
            throughput: Duration::from_secs(300),
            quality: Duration::from_secs(3600),
            health_report: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AirflowConfig {
    pub base_url: String,
    pub auth: Option<AirflowAuth>,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub server: ServerConfig,
    pub warehouse: WarehouseConfig,
    pub quality: ThresholdConfig,
    pub rules: QualityRules,
    pub resources: ResourceThresholds,
    pub disk_path: PathBuf,
    pub freshness_threshold_hours: f64,
    pub intervals: WatchIntervals,
    /// `None` disables the run watcher.
    pub airflow: Option<AirflowConfig>,
    pub webhook_url: Option<String>,
    pub email: Option<EmailConfig>,
    pub dedup: DedupPolicy,
    pub reports_dir: PathBuf,
    pub log_json: bool,
}

/// Reads variables through a lookup function; empty values count as unset.
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value: raw,
            }),
        }
    }

    fn seconds(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parse(var, default.as_secs())?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                var,
                value: secs.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }
}

fn validation(var: &'static str) -> impl FnOnce(CoreError) -> ConfigError {
    move |source| ConfigError::Validation { var, source }
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                              | Default                       |
    /// |--------------------------------------|-------------------------------|
    /// | `HOST` / `PORT`                      | `0.0.0.0` / `8000`            |
    /// | `REQUEST_TIMEOUT_SECS`               | `30`                          |
    /// | `SHUTDOWN_TIMEOUT_SECS`              | `10`                          |
    /// | `DATABASE_URL`                       | required                      |
    /// | `WAREHOUSE_TABLE`                    | `fct_hourly_rentals`          |
    /// | `WAREHOUSE_TIMESTAMP_COLUMN`         | `date`                        |
    /// | `QUALITY_SNAPSHOT_QUERY`             | `SELECT * FROM <table>`       |
    /// | `QUALITY_INVARIANTS`                 | `user_counts:total_rentals=casual_users+registered_users` |
    /// | `QUALITY_*_THRESHOLD`                | 0.95 / 0.90 / 0.95            |
    /// | `QUALITY_TIMELINESS_HOURS`           | `24`                          |
    /// | `QUALITY_ALERT_THRESHOLD`            | `0.90`                        |
    /// | `QUALITY_WEIGHT_*`                   | 0.30 / 0.30 / 0.20 / 0.20     |
    /// | `CPU_/MEMORY_/DISK_USAGE_THRESHOLD`  | `80`                          |
    /// | `DISK_USAGE_PATH`                    | `/`                           |
    /// | `DATA_FRESHNESS_THRESHOLD_HOURS`     | `24`                          |
    /// | `*_WATCH_INTERVAL_SECS`              | 60 / 300 / 3600 / 300         |
    /// | `QUALITY_CHECK_INTERVAL_SECS`        | `3600`                        |
    /// | `HEALTH_REPORT_INTERVAL_SECS`        | `3600`                        |
    /// | `AIRFLOW_BASE_URL`                   | unset (run watcher disabled)  |
    /// | `AIRFLOW_USERNAME` / `_PASSWORD`     | unset                         |
    /// | `AIRFLOW_RUN_WINDOW_HOURS`           | `24`                          |
    /// | `SLACK_WEBHOOK_URL`                  | unset (channel disabled)      |
    /// | `SMTP_HOST` / `SMTP_PORT`            | `smtp.gmail.com` / `587`      |
    /// | `ALERT_EMAIL_SENDER`                 | `alerts@bikeshare.com`        |
    /// | `ALERT_EMAIL_USER` / `_PASSWORD`     | unset                         |
    /// | `ALERT_EMAIL_RECIPIENTS`             | unset (channel disabled)      |
    /// | `ALERT_DEDUP`                        | `every_cycle`                 |
    /// | `ALERT_COOLDOWN_SECS`                | `300`                         |
    /// | `REPORTS_DIR`                        | `monitoring_reports`          |
    /// | `LOG_FORMAT`                         | `text`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let server = ServerConfig {
            host: env.string("HOST", "0.0.0.0"),
            port: env.parse("PORT", 8000)?,
            request_timeout_secs: env.seconds("REQUEST_TIMEOUT_SECS", Duration::from_secs(30))?.as_secs(),
            shutdown_timeout_secs: env.seconds("SHUTDOWN_TIMEOUT_SECS", Duration::from_secs(10))?.as_secs(),
        };

        let warehouse = load_warehouse(&env)?;

        let thresholds = QualityThresholds {
            completeness: env.parse("QUALITY_COMPLETENESS_THRESHOLD", 0.95)?,
            accuracy: env.parse("QUALITY_ACCURACY_THRESHOLD", 0.90)?,
            timeliness_hours: env.parse("QUALITY_TIMELINESS_HOURS", 24.0)?,
            consistency: env.parse("QUALITY_CONSISTENCY_THRESHOLD", 0.95)?,
            alert_ceiling: env.parse("QUALITY_ALERT_THRESHOLD", 0.90)?,
        };
        let weights = DimensionWeights {
            completeness: env.parse("QUALITY_WEIGHT_COMPLETENESS", 0.30)?,
            accuracy: env.parse("QUALITY_WEIGHT_ACCURACY", 0.30)?,
            timeliness: env.parse("QUALITY_WEIGHT_TIMELINESS", 0.20)?,
            consistency: env.parse("QUALITY_WEIGHT_CONSISTENCY", 0.20)?,
        };
        let quality =
            ThresholdConfig::new(thresholds, weights).map_err(validation("QUALITY_*"))?;

        let rules = QualityRules {
            timestamp_column: warehouse.timestamp_column.clone(),
            invariants: QualityRules::parse_invariants(
                &env.string("QUALITY_INVARIANTS", DEFAULT_INVARIANTS),
            )
            .map_err(validation("QUALITY_INVARIANTS"))?,
        };

        let resources = ResourceThresholds {
            cpu: env.parse("CPU_USAGE_THRESHOLD", DEFAULT_RESOURCE_CEILING)?,
            memory: env.parse("MEMORY_USAGE_THRESHOLD", DEFAULT_RESOURCE_CEILING)?,
            disk: env.parse("DISK_USAGE_THRESHOLD", DEFAULT_RESOURCE_CEILING)?,
        };
        resources
            .validate()
            .map_err(validation("*_USAGE_THRESHOLD"))?;

        let freshness_threshold_hours = env.parse(
            "DATA_FRESHNESS_THRESHOLD_HOURS",
            DEFAULT_FRESHNESS_THRESHOLD_HOURS,
        )?;
        validate_positive(freshness_threshold_hours, "freshness threshold")
            .map_err(validation("DATA_FRESHNESS_THRESHOLD_HOURS"))?;

        let defaults = WatchIntervals::default();
        let intervals = WatchIntervals {
            resource: env.seconds("RESOURCE_WATCH_INTERVAL_SECS", defaults.resource)?,
            runs: env.seconds("RUN_WATCH_INTERVAL_SECS", defaults.runs)?,
            freshness: env.seconds("FRESHNESS_WATCH_INTERVAL_SECS", defaults.freshness)?,
            throughput: env.seconds("THROUGHPUT_WATCH_INTERVAL_SECS", defaults.throughput)?,
            quality: env.seconds("QUALITY_CHECK_INTERVAL_SECS", defaults.quality)?,
            health_report: env.seconds("HEALTH_REPORT_INTERVAL_SECS", defaults.health_report)?,
        };

        let airflow = match env.get("AIRFLOW_BASE_URL") {
            None => None,
            Some(base_url) => {
                let auth = match (env.get("AIRFLOW_USERNAME"), env.get("AIRFLOW_PASSWORD")) {
                    (Some(username), Some(password)) => Some(AirflowAuth { username, password }),
                    _ => None,
                };
                let hours: u64 = env.parse("AIRFLOW_RUN_WINDOW_HOURS", DEFAULT_RUN_WINDOW.as_secs() / 3600)?;
                if hours == 0 {
                    return Err(ConfigError::Invalid {
                        var: "AIRFLOW_RUN_WINDOW_HOURS",
                        value: hours.to_string(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Some(AirflowConfig {
                    base_url,
                    auth,
                    window: Duration::from_secs(hours * 3600),
                })
            }
        };

        let email = env
            .get("ALERT_EMAIL_RECIPIENTS")
            .map(|raw| EmailConfig::parse_recipients(&raw))
            .filter(|recipients| !recipients.is_empty())
            .map(|recipients| -> Result<EmailConfig, ConfigError> {
                Ok(EmailConfig {
                    smtp_host: env.string("SMTP_HOST", DEFAULT_SMTP_HOST),
                    smtp_port: env.parse("SMTP_PORT", DEFAULT_SMTP_PORT)?,
                    from_address: env.string("ALERT_EMAIL_SENDER", DEFAULT_FROM_ADDRESS),
                    smtp_user: env.get("ALERT_EMAIL_USER"),
                    smtp_password: env.get("ALERT_EMAIL_PASSWORD"),
                    recipients,
                })
            })
            .transpose()?;

        let dedup = env
            .parse("ALERT_DEDUP", DedupPolicy::EveryCycle)?
            .with_cooldown(env.seconds("ALERT_COOLDOWN_SECS", DEFAULT_ALERT_COOLDOWN)?);

        let log_json = match env.get("LOG_FORMAT").as_deref() {
            None | Some("text") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected 'json' or 'text'".to_string(),
                })
            }
        };

        Ok(Self {
            server,
            warehouse,
            quality,
            rules,
            resources,
            disk_path: PathBuf::from(env.string("DISK_USAGE_PATH", "/")),
            freshness_threshold_hours,
            intervals,
            airflow,
            webhook_url: env.get("SLACK_WEBHOOK_URL"),
            email,
            dedup,
            reports_dir: PathBuf::from(env.string("REPORTS_DIR", DEFAULT_REPORTS_DIR)),
            log_json,
        })
    }
}

fn load_warehouse<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
) -> Result<WarehouseConfig, ConfigError> {
    let database_url = env
        .get("DATABASE_URL")
        .ok_or(ConfigError::Missing("DATABASE_URL"))?;

    let table = env.string("WAREHOUSE_TABLE", DEFAULT_WAREHOUSE_TABLE);
    validate_table(&table).map_err(|e| ConfigError::Invalid {
        var: "WAREHOUSE_TABLE",
        value: table.clone(),
        reason: e.to_string(),
    })?;

    let timestamp_column = env.string("WAREHOUSE_TIMESTAMP_COLUMN", DEFAULT_TIMESTAMP_COLUMN);
    validate_column(&timestamp_column).map_err(|e| ConfigError::Invalid {
        var: "WAREHOUSE_TIMESTAMP_COLUMN",
        value: timestamp_column.clone(),
        reason: e.to_string(),
    })?;

    let snapshot_query = match env.get("QUALITY_SNAPSHOT_QUERY") {
        Some(query) => query,
        None => default_snapshot_query(&table).map_err(|e| ConfigError::Invalid {
            var: "WAREHOUSE_TABLE",
            value: table.clone(),
            reason: e.to_string(),
        })?,
    };

    Ok(WarehouseConfig {
        database_url,
        table,
        timestamp_column,
        snapshot_query,
    })
}
