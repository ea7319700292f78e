//! In-process metrics store shared by every watcher and the `/metrics` route.
//!
//! One coarse `RwLock` guards the whole map. It is held only for the map
//! update itself, never across I/O or an `.await`, so a plain std lock is
//! enough and keeps counter increments free of lost updates.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use pipewatch_core::types::Timestamp;
use serde::Serialize;

/// Current value of one metric, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetricValue {
    Gauge {
        value: f64,
    },
    Counter {
        value: u64,
    },
    /// `counts[i]` is the cumulative number of observations `<= buckets[i]`.
    Histogram {
        buckets: Vec<f64>,
        counts: Vec<u64>,
        sum: f64,
        count: u64,
    },
}

impl MetricValue {
    pub fn kind(&self) -> &'static str {
        match self {
            MetricValue::Gauge { .. } => "gauge",
            MetricValue::Counter { .. } => "counter",
            MetricValue::Histogram { .. } => "histogram",
        }
    }
}

/// One metric as captured by [`MetricsRegistry::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub help: String,
    pub value: MetricValue,
    /// `None` until the first update (counters and histograms start at zero).
    pub updated_at: Option<Timestamp>,
}

/// Consistent copy of the registry taken under a single read lock.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub taken_at: Timestamp,
    pub metrics: Vec<MetricSample>,
}

impl RegistrySnapshot {
    pub fn get(&self, name: &str) -> Option<&MetricSample> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        match self.get(name)?.value {
            MetricValue::Gauge { value } => Some(value),
            _ => None,
        }
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        match self.get(name)?.value {
            MetricValue::Counter { value } => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct MetricEntry {
    help: String,
    value: Option<MetricValue>,
    updated_at: Option<Timestamp>,
}

/// Thread-safe metric map. Share it as `Arc<MetricsRegistry>`.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    entries: RwLock<BTreeMap<String, MetricEntry>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<R>(&self, f: impl FnOnce(&mut BTreeMap<String, MetricEntry>) -> R) -> R {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Attach help text. The kind is fixed by the first update.
    pub fn describe(&self, name: &str, help: &str) {
        self.write(|entries| {
            entries.entry(name.to_string()).or_default().help = help.to_string();
        });
    }

    /// Attach help text and expose the counter at zero before its first increment.
    pub fn describe_counter(&self, name: &str, help: &str) {
        self.write(|entries| {
            let entry = entries.entry(name.to_string()).or_default();
            entry.help = help.to_string();
            if entry.value.is_none() {
                entry.value = Some(MetricValue::Counter { value: 0 });
            }
        });
    }

    /// Declare a histogram with the given upper bucket bounds.
    pub fn describe_histogram(&self, name: &str, help: &str, buckets: &[f64]) {
        let mut buckets: Vec<f64> = buckets.iter().copied().filter(|b| b.is_finite()).collect();
        buckets.sort_by(f64::total_cmp);
        buckets.dedup();

        self.write(|entries| {
            let entry = entries.entry(name.to_string()).or_default();
            entry.help = help.to_string();
            match &entry.value {
                None => {
                    entry.value = Some(MetricValue::Histogram {
                        counts: vec![0; buckets.len()],
                        buckets,
                        sum: 0.0,
                        count: 0,
                    });
                }
                Some(MetricValue::Histogram { .. }) => {}
                Some(other) => {
                    tracing::warn!(metric = name, kind = other.kind(), "Cannot redeclare metric as histogram");
                }
            }
        });
    }

    /// Overwrite a gauge.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.write(|entries| {
            let entry = entries.entry(name.to_string()).or_default();
            match &entry.value {
                None | Some(MetricValue::Gauge { .. }) => {
                    entry.value = Some(MetricValue::Gauge { value });
                    entry.updated_at = Some(Utc::now());
                }
                Some(other) => {
                    tracing::warn!(metric = name, kind = other.kind(), "Ignoring gauge update for non-gauge metric");
                }
            }
        });
    }

    /// Add `delta` to a counter.
    pub fn increment_counter(&self, name: &str, delta: u64) {
        self.write(|entries| {
            let entry = entries.entry(name.to_string()).or_default();
            match &mut entry.value {
                None => {
                    entry.value = Some(MetricValue::Counter { value: delta });
                    entry.updated_at = Some(Utc::now());
                }
                Some(MetricValue::Counter { value }) => {
                    *value = value.saturating_add(delta);
                    entry.updated_at = Some(Utc::now());
                }
                Some(other) => {
                    tracing::warn!(metric = name, kind = other.kind(), "Ignoring counter update for non-counter metric");
                }
            }
        });
    }

    /// Record one observation in a declared histogram.
    pub fn observe_histogram(&self, name: &str, observation: f64) {
        if !observation.is_finite() {
            tracing::warn!(metric = name, observation, "Ignoring non-finite histogram observation");
            return;
        }
        self.write(|entries| {
            let Some(entry) = entries.get_mut(name) else {
                tracing::warn!(metric = name, "Ignoring observation for undeclared histogram");
                return;
            };
            match &mut entry.value {
                Some(MetricValue::Histogram {
                    buckets,
                    counts,
                    sum,
                    count,
                }) => {
                    for (bound, slot) in buckets.iter().zip(counts.iter_mut()) {
                        if observation <= *bound {
                            *slot += 1;
                        }
                    }
                    *sum += observation;
                    *count += 1;
                    entry.updated_at = Some(Utc::now());
                }
                other => {
                    let kind = other.as_ref().map_or("undeclared", MetricValue::kind);
                    tracing::warn!(metric = name, kind, "Ignoring observation for non-histogram metric");
                }
            }
        });
    }

    /// Copy every metric that has a value, sorted by name.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let metrics = guard
            .iter()
            .filter_map(|(name, entry)| {
                entry.value.clone().map(|value| MetricSample {
                    name: name.clone(),
                    help: entry.help.clone(),
                    value,
                    updated_at: entry.updated_at,
                })
            })
            .collect();
        RegistrySnapshot {
            taken_at: Utc::now(),
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
