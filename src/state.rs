//! Process-wide-looking but simulation-scoped shared state (spec §3, §5,
//! Design Notes "Global mutable state").
//!
//! The source keeps atomic counters reachable from every task; the spec
//! requires they live in an explicit struct passed to each driver rather
//! than as process-wide globals. `SharedCounters`, `RunTracker`, and
//! `ForceStop` are that struct, constructed once per simulation by the
//! orchestrator and handed out as `Arc`s. Grounded in the teacher's atomic
//! counter style in `connection_pool.rs` and `worker.rs`'s `SAMPLE_COUNTER`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// `prepared-requests`, `sent-requests`, and per-scenario `concurrent-scenarios`.
pub struct SharedCounters {
    pub prepared_requests: AtomicU64,
    pub sent_requests: AtomicU64,
    concurrent_scenarios: HashMap<String, AtomicI64>,
}

impl SharedCounters {
    pub fn new() -> Self {
        Self {
            prepared_requests: AtomicU64::new(0),
            sent_requests: AtomicU64::new(0),
            concurrent_scenarios: HashMap::new(),
        }
    }

    pub fn for_scenarios(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            prepared_requests: AtomicU64::new(0),
            sent_requests: AtomicU64::new(0),
            concurrent_scenarios: names.into_iter().map(|n| (n, AtomicI64::new(0))).collect(),
        }
    }

    /// In-flight count for `scenario`, mutated only by that scenario's own
    /// drivers (spec §5, "Shared resource policy").
    pub fn concurrent_scenarios(&self, scenario: &str) -> &AtomicI64 {
        self.concurrent_scenarios
            .get(scenario)
            .unwrap_or_else(|| panic!("no concurrent-scenarios counter registered for {scenario}"))
    }
}

impl Default for SharedCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-scenario monotonic "next trigger time" for the Rate Driver, stored as
/// nanoseconds since the simulation's start instant.
///
/// Shared across every Rate Driver instance of one scenario: each instance's
/// `fetch_add` claims the next slot, which is how multiple per-user driver
/// tasks combine into a single target arrival rate for the scenario as a
/// whole (spec §4.7 step 1).
pub struct RunTracker {
    next_trigger_nanos: AtomicI64,
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            next_trigger_nanos: AtomicI64::new(0),
        }
    }

    /// Claims the next slot, advancing the tracker by `interval + jitter`
    /// nanoseconds, and returns the claimed absolute offset.
    pub fn advance(&self, delta_nanos: i64) -> i64 {
        self.next_trigger_nanos.fetch_add(delta_nanos, Ordering::SeqCst) + delta_nanos
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Write-once, readable-by-all cooperative shutdown signal.
#[derive(Default)]
pub struct ForceStop(AtomicBool);

impl ForceStop {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_tracker_advances_monotonically_across_claims() {
        let tracker = RunTracker::new();
        let first = tracker.advance(1_000_000);
        let second = tracker.advance(1_000_000);
        assert!(second > first);
    }

    #[test]
    fn force_stop_is_write_once_readable() {
        let stop = ForceStop::new();
        assert!(!stop.is_triggered());
        stop.trigger();
        assert!(stop.is_triggered());
    }

    #[test]
    fn concurrent_scenarios_tracks_per_scenario_counts() {
        let counters = SharedCounters::for_scenarios(["checkout".to_string(), "browse".to_string()]);
        counters.concurrent_scenarios("checkout").fetch_add(1, Ordering::Relaxed);
        assert_eq!(counters.concurrent_scenarios("checkout").load(Ordering::Relaxed), 1);
        assert_eq!(counters.concurrent_scenarios("browse").load(Ordering::Relaxed), 0);
    }
}
