//! Orchestration run tracking.
//!
//! The run source is polled over a sliding window, so the same run is seen
//! on many polls. [`RunTracker`] remembers which terminal runs have already
//! been counted so that each one is counted (and alerted on) exactly once.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Default look-back window for run polling.
pub const DEFAULT_RUN_WINDOW: Duration = Duration::from_secs(24 * 3600);

/// State of an orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Queued,
    Running,
    Success,
    Failed,
    /// Any state this monitor does not act on (`up_for_retry`, `skipped`, ...).
    Other(String),
}

impl RunState {
    /// Only terminal runs are counted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Success | RunState::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Success => "success",
            RunState::Failed => "failed",
            RunState::Other(s) => s,
        }
    }
}

impl From<String> for RunState {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "queued" => RunState::Queued,
            "running" => RunState::Running,
            "success" => RunState::Success,
            "failed" => RunState::Failed,
            _ => RunState::Other(s),
        }
    }
}

impl From<RunState> for String {
    fn from(state: RunState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One orchestration run as reported by the run source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub dag_id: String,
    pub state: RunState,
    pub start_date: Option<Timestamp>,
}

impl RunRecord {
    /// Run ids are only unique within a DAG.
    pub fn key(&self) -> String {
        format!("{}/{}", self.dag_id, self.run_id)
    }

    pub fn failure_message(&self) -> String {
        let started = self
            .start_date
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "Pipeline run failed\n\nDAG: {}\nRun: {}\nStarted: {started}",
            self.dag_id, self.run_id
        )
    }
}

/// Terminal runs seen for the first time on this poll.
#[derive(Debug, Default, PartialEq)]
pub struct RunClassification {
    pub new_successes: Vec<RunRecord>,
    pub new_failures: Vec<RunRecord>,
}

impl RunClassification {
    pub fn is_empty(&self) -> bool {
        self.new_successes.is_empty() && self.new_failures.is_empty()
    }
}

/// Remembers counted runs; entries are forgotten after twice the poll window.
#[derive(Debug)]
pub struct RunTracker {
    window: Duration,
    seen: HashMap<String, Timestamp>,
}

impl RunTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Classify `runs`, marking newly seen terminal runs as counted.
    pub fn observe(&mut self, runs: Vec<RunRecord>, now: Timestamp) -> RunClassification {
        self.prune(now);

        let mut out = RunClassification::default();
        for run in runs {
            if !run.state.is_terminal() {
                continue;
            }
            if self.seen.insert(run.key(), now).is_some() {
                continue;
            }
            match run.state {
                RunState::Success => out.new_successes.push(run),
                RunState::Failed => out.new_failures.push(run),
                _ => {}
            }
        }
        out
    }

    fn prune(&mut self, now: Timestamp) {
        let Ok(window) = chrono::Duration::from_std(self.window * 2) else {
            return;
        };
        let cutoff = now - window;
        self.seen.retain(|_, seen_at| *seen_at >= cutoff);
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_WINDOW)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hours: i64) -> Timestamp {
        chrono::Utc.timestamp_opt(1_700_000_000 + hours * 3600, 0).unwrap()
    }

    fn run(id: &str, state: &str) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            dag_id: "bikeshare_pipeline".to_string(),
            state: RunState::from(state.to_string()),
            start_date: Some(at(0)),
        }
    }

    #[test]
    fn parses_known_and_unknown_states() {
        assert_eq!(RunState::from("SUCCESS".to_string()), RunState::Success);
        assert_eq!(
            RunState::from("up_for_retry".to_string()),
            RunState::Other("up_for_retry".to_string())
        );
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }

    #[test]
    fn terminal_runs_counted_once() {
        let mut tracker = RunTracker::default();
        let polled = vec![run("r1", "success"), run("r2", "failed"), run("r3", "running")];

        let first = tracker.observe(polled.clone(), at(1));
        assert_eq!(first.new_successes.len(), 1);
        assert_eq!(first.new_failures.len(), 1);

        let second = tracker.observe(polled, at(2));
        assert!(second.is_empty());
    }

    #[test]
    fn running_run_counted_when_it_finishes() {
        let mut tracker = RunTracker::default();
        assert!(tracker.observe(vec![run("r1", "running")], at(1)).is_empty());
        assert_eq!(tracker.seen_count(), 0);

        let done = tracker.observe(vec![run("r1", "failed")], at(2));
        assert_eq!(done.new_failures[0].run_id, "r1");
    }

    #[test]
    fn same_run_id_in_other_dag_is_distinct() {
        let mut tracker = RunTracker::default();
        let mut other = run("r1", "success");
        other.dag_id = "other".to_string();
        let out = tracker.observe(vec![run("r1", "success"), other], at(1));
        assert_eq!(out.new_successes.len(), 2);
    }

    #[test]
    fn old_entries_pruned_after_twice_the_window() {
        let mut tracker = RunTracker::new(Duration::from_secs(3600));
        tracker.observe(vec![run("r1", "success")], at(0));
        tracker.observe(Vec::new(), at(2));
        assert_eq!(tracker.seen_count(), 1);
        tracker.observe(Vec::new(), at(3));
        assert_eq!(tracker.seen_count(), 0);
    }

    #[test]
    fn record_deserializes_from_json() {
        let json = r#"{"run_id":"r9","dag_id":"d","state":"failed","start_date":null}"#;
        let record: RunRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.state, RunState::Failed);
        assert!(record.failure_message().contains("Started: unknown"));
    }
}
