//! Alert severity and repeat-suppression policy.
//!
//! Pure logic. Watchers own an [`AlertGate`] and consult it every cycle with
//! the current state of each condition; the gate decides whether that cycle
//! should notify.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default minimum interval between repeated alerts under [`DedupPolicy::Cooldown`].
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(300); // 5 minutes

/// Severity attached to a dispatched alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a persisting violation is re-notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "cooldown_secs")]
pub enum DedupPolicy {
    /// Alert on every cycle the condition holds.
    EveryCycle,
    /// Alert when the condition starts; re-arm once it clears.
    OnTransition,
    /// Alert at most once per interval for each condition key.
    Cooldown(#[serde(with = "duration_secs")] Duration),
}

impl Default for DedupPolicy {
    fn default() -> Self {
        DedupPolicy::EveryCycle
    }
}

/// Parses `every_cycle`, `on_transition` or `cooldown`. The cooldown interval
/// starts at [`DEFAULT_ALERT_COOLDOWN`]; see [`DedupPolicy::with_cooldown`].
impl FromStr for DedupPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "every_cycle" => Ok(DedupPolicy::EveryCycle),
            "on_transition" => Ok(DedupPolicy::OnTransition),
            "cooldown" => Ok(DedupPolicy::Cooldown(DEFAULT_ALERT_COOLDOWN)),
            other => Err(CoreError::ConfigValidation(format!(
                "unknown alert dedup policy '{other}' (expected every_cycle, on_transition or cooldown)"
            ))),
        }
    }
}

impl DedupPolicy {
    /// Replace the interval of a `Cooldown` policy; other policies are returned as-is.
    pub fn with_cooldown(self, interval: Duration) -> Self {
        match self {
            DedupPolicy::Cooldown(_) => DedupPolicy::Cooldown(interval),
            other => other,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

#[derive(Debug, Default)]
struct GateEntry {
    active: bool,
    last_fired: Option<Timestamp>,
}

/// Per-condition alert state for one watcher.
#[derive(Debug, Default)]
pub struct AlertGate {
    policy: DedupPolicy,
    entries: HashMap<String, GateEntry>,
}

impl AlertGate {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Record the current state of `key` and return whether to alert now.
    ///
    /// Must be called every cycle, including when the condition is clear, so
    /// that `OnTransition` can re-arm.
    pub fn should_fire(&mut self, key: &str, violated: bool, now: Timestamp) -> bool {
        let entry = self.entries.entry(key.to_string()).or_default();
        let was_active = entry.active;
        entry.active = violated;

        if !violated {
            return false;
        }

        let fire = match self.policy {
            DedupPolicy::EveryCycle => true,
            DedupPolicy::OnTransition => !was_active,
            DedupPolicy::Cooldown(interval) => match entry.last_fired {
                None => true,
                Some(last) => now
                    .signed_duration_since(last)
                    .to_std()
                    .map(|elapsed| elapsed >= interval)
                    // Clock stepped backwards.
                    .unwrap_or(false),
            },
        };

        if fire {
            entry.last_fired = Some(now);
        }
        fire
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
