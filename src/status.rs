//! Run tracker: single-flight admission and stage reporting.
//!
//! Process-scoped state: created empty at startup, one entry per
//! in-flight run, removed unconditionally when the run ends. Never
//! persisted and does not survive restart.
//!
//! Admission is a single insert-if-absent under one lock acquisition,
//! so two concurrent `begin` calls for the same user can never both be
//! admitted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stage a run is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Fetching,
    Filtering,
    Storing,
    Summarizing,
    Aggregating,
    UpdatingStats,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Fetching => "fetching",
            RunStage::Filtering => "filtering",
            RunStage::Storing => "storing",
            RunStage::Summarizing => "summarizing",
            RunStage::Aggregating => "aggregating",
            RunStage::UpdatingStats => "updating_stats",
        };
        f.write_str(name)
    }
}

/// Snapshot of one in-flight run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub stage: RunStage,
    pub started_at: DateTime<Utc>,
}

/// Outcome of an admission attempt.
#[derive(Debug, Clone)]
pub enum Admission {
    /// No run was in flight; a new entry was installed at `Fetching`.
    Admitted,
    /// A run is already in flight: the existing status, unchanged.
    AlreadyRunning(RunStatus),
}

/// Caller-facing status report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessingStatus {
    Idle,
    Running {
        stage: RunStage,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
    },
}

/// Per-user mutual-exclusion gate for pipeline runs.
#[derive(Default)]
pub struct RunTracker {
    runs: Mutex<HashMap<String, RunStatus>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a run, or report the one already in flight.
    ///
    /// Check-and-insert happens under a single lock acquisition.
    pub fn begin(&self, user_id: &str) -> Admission {
        let mut runs = self.runs.lock().unwrap();
        match runs.entry(user_id.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                Admission::AlreadyRunning(entry.get().clone())
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(RunStatus {
                    stage: RunStage::Fetching,
                    started_at: Utc::now(),
                });
                Admission::Admitted
            }
        }
    }

    /// Move an in-flight run to `stage`. No-op if the run is gone.
    pub fn set_stage(&self, user_id: &str, stage: RunStage) {
        if let Some(status) = self.runs.lock().unwrap().get_mut(user_id) {
            status.stage = stage;
        }
    }

    /// Remove the run entry. Called on every outcome: success, early
    /// exit, or failure.
    pub fn finish(&self, user_id: &str) {
        self.runs.lock().unwrap().remove(user_id);
    }

    /// Current status for a user.
    pub fn query(&self, user_id: &str) -> ProcessingStatus {
        match self.runs.lock().unwrap().get(user_id) {
            None => ProcessingStatus::Idle,
            Some(status) => ProcessingStatus::Running {
                stage: status.stage,
                started_at: status.started_at,
                elapsed_ms: Utc::now()
                    .signed_duration_since(status.started_at)
                    .num_milliseconds()
                    .max(0) as u64,
            },
        }
    }

    /// Number of in-flight runs (all users).
    pub fn active_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_installs_fetching_stage() {
        let tracker = RunTracker::new();
        assert!(matches!(tracker.begin("u1"), Admission::Admitted));
        match tracker.query("u1") {
            ProcessingStatus::Running { stage, .. } => assert_eq!(stage, RunStage::Fetching),
            ProcessingStatus::Idle => panic!("expected running"),
        }
    }

    #[test]
    fn second_begin_reports_existing_run() {
        let tracker = RunTracker::new();
        assert!(matches!(tracker.begin("u1"), Admission::Admitted));
        tracker.set_stage("u1", RunStage::Summarizing);

        match tracker.begin("u1") {
            Admission::AlreadyRunning(status) => {
                assert_eq!(status.stage, RunStage::Summarizing);
            }
            Admission::Admitted => panic!("second begin must not be admitted"),
        }
    }

    #[test]
    fn finish_returns_to_idle() {
        let tracker = RunTracker::new();
        tracker.begin("u1");
        tracker.finish("u1");
        assert!(matches!(tracker.query("u1"), ProcessingStatus::Idle));
        // Finishing an absent run is harmless.
        tracker.finish("u1");
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn users_are_independent() {
        let tracker = RunTracker::new();
        tracker.begin("u1");
        assert!(matches!(tracker.begin("u2"), Admission::Admitted));
        assert_eq!(tracker.active_count(), 2);
    }

    #[test]
    fn concurrent_begin_admits_exactly_one() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let tracker = Arc::new(RunTracker::new());
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    if matches!(tracker.begin("u1"), Admission::Admitted) {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }
}
