//! Rate Driver (spec §4.7): one instance per assigned user per scenario,
//! triggering scenario executions at a jittered interval to approximate a
//! constant arrival rate across all of a scenario's driver instances.
//!
//! Grounded in the teacher's `worker::run_worker` absolute-time pacing loop
//! (`sleep_until` against a drifting `next_fire`, self-correcting for
//! overshoot) but replaces the per-worker cycle with the spec's shared
//! `RunTracker`: every instance of a scenario's Rate Driver claims its next
//! slot from the same atomic, so N driver instances combine into one target
//! rate for the scenario as a whole.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::Sender;
use tokio::time::{self, Instant};

use crate::context::Context;
use crate::metrics;
use crate::result::ScenarioResult;
use crate::runner::Runner;
use crate::scenario::Scenario;
use crate::scenario_runner;
use crate::state::{ForceStop, RunTracker, SharedCounters};

/// Runs the Rate Driver loop for one user of `scenario` until the Runner
/// says stop or force-stop is triggered.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    scenario: Arc<Scenario>,
    user_id: u64,
    base_rate: f64,
    base_context: Context,
    timeout: Duration,
    counters: Arc<SharedCounters>,
    run_tracker: Arc<RunTracker>,
    runner: Arc<dyn Runner>,
    force_stop: Arc<ForceStop>,
    start_instant: Instant,
    sink: Sender<ScenarioResult>,
) {
    loop {
        if force_stop.is_triggered() {
            break;
        }

        let sent = counters.sent_requests.load(Ordering::Relaxed);
        let multiplier = match &scenario.rate_distribution {
            Some(distribution) => {
                let progress = runner.progress(sent, start_instant, Instant::now());
                distribution.eval(progress.fraction, progress.elapsed, &base_context)
            }
            None => 1.0,
        };
        let effective_rate = (base_rate * multiplier).max(f64::MIN_POSITIVE);
        let interval_nanos = (1e9 / effective_rate) as i64;
        let jitter_nanos = rand::thread_rng().gen_range(-interval_nanos / 4..=interval_nanos / 4);

        let next_trigger_nanos = run_tracker.advance(interval_nanos + jitter_nanos);
        let next_run_at = start_instant + Duration::from_nanos(next_trigger_nanos.max(0) as u64);

        let prepared = counters.prepared_requests.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::PREPARED_REQUESTS_TOTAL.inc();
        if !runner.should_continue(prepared, start_instant, next_run_at) {
            break;
        }

        let now = Instant::now();
        if next_run_at > now {
            time::sleep_until(next_run_at).await;
        }

        counters.concurrent_scenarios(&scenario.name).fetch_add(1, Ordering::SeqCst);
        metrics::CONCURRENT_SCENARIOS.with_label_values(&[&scenario.name]).inc();
        metrics::IN_FLIGHT_SCENARIOS.inc();
        let result = scenario_runner::run_once(
            &scenario,
            user_id,
            &base_context,
            timeout,
            &counters,
            &runner,
            &force_stop,
            sent,
            start_instant,
        )
        .await;
        counters.concurrent_scenarios(&scenario.name).fetch_add(-1, Ordering::SeqCst);
        metrics::IN_FLIGHT_SCENARIOS.dec();

        if sink.send(result).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::DurationRunner;
    use crate::scenario::{Step, StepOutcome};
    use tokio::sync::mpsc;

    fn ok_step(name: &str) -> Step {
        Step::new(
            name,
            Arc::new(|_ctx: Context| async move { Ok(StepOutcome::Value(true.into())) }),
        )
    }

    #[tokio::test]
    async fn driver_emits_results_and_stops_at_duration() {
        let scenario = Arc::new(Scenario::new("checkout", vec![ok_step("s1")]));
        let counters = Arc::new(SharedCounters::for_scenarios(["checkout".to_string()]));
        let run_tracker = Arc::new(RunTracker::new());
        let runner: Arc<dyn Runner> = Arc::new(DurationRunner {
            duration: Duration::from_millis(150),
        });
        let force_stop = Arc::new(ForceStop::new());
        let (tx, mut rx) = mpsc::channel(256);

        run(
            scenario,
            1,
            50.0,
            Context::new(),
            Duration::from_secs(1),
            counters.clone(),
            run_tracker,
            runner,
            force_stop,
            Instant::now(),
            tx,
        )
        .await;

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert!(received >= 1);
        assert_eq!(counters.concurrent_scenarios("checkout").load(Ordering::Relaxed), 0);
    }
}
