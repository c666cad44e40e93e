//! Progress tracker collaborator (spec §6, §9).
//!
//! The spec treats this as an opaque collaborator the engine merely wires
//! up: it is handed read access to the counters and a force-stop callback,
//! and returns a stop function. Design Notes §9 says an implementer is free
//! to ship a no-op default, so that is what `NoopProgressTracker` is; real
//! reporting (terminal bars, periodic log lines) is a surrounding concern
//! the way CLI/report rendering are (spec §1).

use std::sync::Arc;
use std::time::Duration;

use crate::runner::Progress;
use crate::state::{ForceStop, SharedCounters};

/// What a progress tracker is given on start (spec §6).
pub struct ProgressTrackerContext {
    pub counters: Arc<SharedCounters>,
    pub force_stop: Arc<ForceStop>,
    pub progress: Progress,
}

/// A stoppable progress-reporting collaborator.
pub trait ProgressTracker: Send + Sync {
    /// Called by the orchestrator on a fixed cadence while drivers are
    /// running, plus once more at shutdown with the final progress snapshot
    /// (spec §9: the tracker "must not mutate engine state otherwise" than
    /// reading counters and calling `force_stop`).
    fn on_tick(&self, ctx: &ProgressTrackerContext);

    /// Called once at simulation shutdown.
    fn stop(&self);
}

/// The default: observes nothing, stops instantly.
pub struct NoopProgressTracker;

impl ProgressTracker for NoopProgressTracker {
    fn on_tick(&self, _ctx: &ProgressTrackerContext) {}
    fn stop(&self) {}
}

/// A tracker that force-stops the simulation once `fraction >= 1.0`
/// according to the Runner's own progress computation — useful as a
/// building block for custom trackers that want the default stop behavior
/// plus their own reporting.
pub struct AutoStopProgressTracker;

impl ProgressTracker for AutoStopProgressTracker {
    fn on_tick(&self, ctx: &ProgressTrackerContext) {
        if ctx.progress.fraction >= 1.0 {
            ctx.force_stop.trigger();
        }
    }

    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn noop_tracker_never_triggers_force_stop() {
        let tracker = NoopProgressTracker;
        let ctx = ProgressTrackerContext {
            counters: Arc::new(SharedCounters::new()),
            force_stop: Arc::new(ForceStop::new()),
            progress: Progress {
                fraction: 1.0,
                elapsed: Duration::from_secs(1),
            },
        };
        tracker.on_tick(&ctx);
        assert!(!ctx.force_stop.is_triggered());
    }

    #[test]
    fn auto_stop_tracker_triggers_at_full_progress() {
        let tracker = AutoStopProgressTracker;
        let ctx = ProgressTrackerContext {
            counters: Arc::new(SharedCounters::new()),
            force_stop: Arc::new(ForceStop::new()),
            progress: Progress {
                fraction: 1.0,
                elapsed: Duration::from_secs(1),
            },
        };
        tracker.on_tick(&ctx);
        assert!(ctx.force_stop.is_triggered());
        let _ = Instant::now();
    }
}
