//! Concurrency Driver (spec §4.6): one instance per assigned user per
//! scenario, keeping a target number of scenario executions in flight.
//!
//! Grounded in the teacher's `worker::run_scenario_worker` task-loop shape
//! (stagger-free here since concurrency, unlike rate, has no fixed cycle to
//! desynchronize from) but replaces its load-model RPS curve with the
//! spec's eligibility poll: run when `base_concurrency * multiplier >
//! current_in_flight`, else sleep 200ms and re-check.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tokio::time::{self, Instant};

use crate::context::Context;
use crate::metrics;
use crate::result::ScenarioResult;
use crate::runner::Runner;
use crate::scenario::Scenario;
use crate::scenario_runner;
use crate::state::{ForceStop, SharedCounters};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs the Concurrency Driver loop for one user of `scenario` until the
/// Runner says stop or force-stop is triggered, sending each completed
/// [`ScenarioResult`] to `sink`.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    scenario: Arc<Scenario>,
    user_id: u64,
    base_concurrency: f64,
    base_context: Context,
    timeout: Duration,
    counters: Arc<SharedCounters>,
    runner: Arc<dyn Runner>,
    force_stop: Arc<ForceStop>,
    start_instant: Instant,
    sink: Sender<ScenarioResult>,
) {
    loop {
        let sent = counters.sent_requests.load(Ordering::Relaxed);
        if force_stop.is_triggered() || !runner.should_continue(sent, start_instant, Instant::now()) {
            break;
        }

        let multiplier = match &scenario.concurrency_distribution {
            Some(distribution) => {
                let progress = runner.progress(sent, start_instant, Instant::now());
                distribution.eval(progress.fraction, progress.elapsed, &base_context)
            }
            None => 1.0,
        };
        let target = base_concurrency * multiplier;
        let in_flight = counters.concurrent_scenarios(&scenario.name).load(Ordering::Relaxed) as f64;

        if target <= in_flight {
            time::sleep(POLL_INTERVAL).await;
            continue;
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
