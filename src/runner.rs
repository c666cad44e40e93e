//! Runner: the termination-policy authority for a simulation (spec §4.2).
//!
//! This replaces the teacher's `load_models::LoadModel` (which computed a
//! target RPS curve over elapsed time) with the stop-condition contract the
//! engine actually needs here: `should_continue`, `progress`, `info`. A
//! single `Arc<dyn Runner>` is shared by every driver in a simulation.

use std::time::Duration;

use tokio::time::Instant;

/// Progress fraction in `[0, 1]` plus the elapsed wall time it corresponds to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub fraction: f64,
    pub elapsed: Duration,
}

/// Shared termination-policy contract for all Runner variants.
pub trait Runner: Send + Sync {
    /// Should a driver launch another scenario run?
    ///
    /// `sent` is the current `sent-requests` (or `prepared-requests`, for a
    /// Rate Driver's optimistic check) counter value; `start` is the
    /// simulation's start instant; `next_run_at` is when the candidate run
    /// would actually begin.
    fn should_continue(&self, sent: u64, start: Instant, next_run_at: Instant) -> bool;

    fn progress(&self, sent: u64, start: Instant, now: Instant) -> Progress;

    fn info(&self) -> String;
}

/// Runs for a fixed wall-clock duration.
pub struct DurationRunner {
    pub duration: Duration,
}

impl Runner for DurationRunner {
    fn should_continue(&self, _sent: u64, start: Instant, next_run_at: Instant) -> bool {
        next_run_at < start + self.duration
    }

    fn progress(&self, _sent: u64, start: Instant, now: Instant) -> Progress {
        let elapsed = now.saturating_duration_since(start);
        let fraction = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0);
        Progress { fraction, elapsed }
    }

    fn info(&self) -> String {
        format!("duration runner ({:?})", self.duration)
    }
}

/// Runs until `total_requests` RequestResults have been sent.
pub struct RequestCountRunner {
    pub total_requests: u64,
}

impl Runner for RequestCountRunner {
    fn should_continue(&self, sent: u64, _start: Instant, _next_run_at: Instant) -> bool {
        sent < self.total_requests
    }

    fn progress(&self, sent: u64, start: Instant, now: Instant) -> Progress {
        let fraction = (sent as f64 / self.total_requests as f64).min(1.0);
        Progress {
            fraction,
            elapsed: now.saturating_duration_since(start),
        }
    }

    fn info(&self) -> String {
        format!("request-count runner ({} requests)", self.total_requests)
    }
}

/// Runs until every user has executed the scenario exactly `runs_per_user`
/// times — i.e. `sent < runs_per_user * user_count`.
pub struct FixedRunsRunner {
    pub runs_per_user: u64,
    pub user_count: u64,
}

impl Runner for FixedRunsRunner {
    fn should_continue(&self, sent: u64, _start: Instant, _next_run_at: Instant) -> bool {
        sent < self.runs_per_user * self.user_count
    }

    fn progress(&self, sent: u64, start: Instant, now: Instant) -> Progress {
        let total = self.runs_per_user * self.user_count;
        let fraction = (sent as f64 / total as f64).min(1.0);
        Progress {
            fraction,
            elapsed: now.saturating_duration_since(start),
        }
    }

    fn info(&self) -> String {
        format!(
            "fixed-runs runner ({} runs x {} users)",
            self.runs_per_user, self.user_count
        )
    }
}
