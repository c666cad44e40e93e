//! Orchestrator (spec §4.8): the single entry point. Validates input, fans
//! out per-user driver tasks, fans their results into one stream, and
//! manages shutdown.
//!
//! Grounded in the teacher's top-level harness (the part of the binary that
//! built workers, spawned them, and collected their output — see the
//! deleted `main.rs`/`config.rs`, cited here as grounding even though their
//! CLI/config-loading content itself is out of scope) but reworked around
//! the spec's fan-in model: every driver is handed a clone of a single
//! `mpsc::Sender<ScenarioResult>` rather than the source's nested
//! per-driver → per-scenario → global merge tree (see SPEC_FULL.md §4.8,
//! "Fan-in simplification").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_stream::wrappers::ReceiverStream;

use crate::context::Context;
use crate::errors::ValidationError;
use crate::progress::{NoopProgressTracker, ProgressTracker, ProgressTrackerContext};
use crate::result::ScenarioResult;
use crate::runner::{DurationRunner, FixedRunsRunner, RequestCountRunner, Runner};
use crate::scenario::{Distribution, Scenario};
use crate::splitter;
use crate::state::{ForceStop, RunTracker, SharedCounters};
use crate::{concurrency_driver, rate_driver};

/// How often the progress tracker is ticked while drivers are running.
const PROGRESS_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// A full simulation: scenarios plus top-level hooks (spec §3, §6).
pub struct Simulation {
    pub scenarios: Vec<Scenario>,
    pub pre_hook: Option<Arc<dyn crate::scenario::Hook>>,
    pub post_hook: Option<Arc<dyn crate::scenario::Hook>>,
}

impl Simulation {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self {
            scenarios,
            pre_hook: None,
            post_hook: None,
        }
    }
}

/// Exactly one Runner-selecting key, picked by construction rather than by
/// runtime validation of mutually exclusive options fields (spec §4.2
/// "Selection"; the ambiguity the spec's validation rule guards against
/// cannot arise once this is a Rust enum — see DESIGN.md).
pub enum RunnerKind {
    Duration(Duration),
    RequestCount(u64),
    FixedRuns(u64),
}

/// Options recognised by the Orchestrator (spec §6).
pub struct SimulationOptions {
    pub users: Option<Vec<u64>>,
    pub concurrency: Option<usize>,
    pub rate: Option<u64>,
    pub context: Context,
    pub timeout: Duration,
    pub runner: RunnerKind,
    pub concurrency_distribution: Option<Distribution>,
    pub rate_distribution: Option<Distribution>,
    pub pre_hook: Option<Arc<dyn crate::scenario::Hook>>,
    pub post_hook: Option<Arc<dyn crate::scenario::Hook>>,
    pub progress_tracker: Option<Arc<dyn ProgressTracker>>,
}

impl SimulationOptions {
    pub fn new(runner: RunnerKind) -> Self {
        Self {
            users: None,
            concurrency: None,
            rate: None,
            context: Context::new(),
            timeout: Duration::from_secs(30),
            runner,
            concurrency_distribution: None,
            rate_distribution: None,
            pre_hook: None,
            post_hook: None,
            progress_tracker: None,
        }
    }
}

/// Handle returned to the caller: the result stream plus the cooperative
/// force-stop switch (spec §4.8 entry signature).
pub struct RunHandle {
    pub results: ReceiverStream<ScenarioResult>,
    pub force_stop: Arc<ForceStop>,
}

fn validate(simulation: &Simulation, options: &SimulationOptions) -> Result<(), ValidationError> {
    if simulation.scenarios.is_empty() {
        return Err(ValidationError::NoScenarios);
    }
    for scenario in &simulation.scenarios {
        if scenario.is_empty() {
            return Err(ValidationError::EmptyScenario(scenario.name.clone()));
        }
        if scenario.weight == 0 {
            return Err(ValidationError::NonPositiveWeight(scenario.weight, scenario.name.clone()));
        }
    }
    let user_count = options
        .users
        .as_ref()
        .map(|u| u.len())
        .or(options.concurrency)
        .unwrap_or(0);
    if user_count < simulation.scenarios.len() {
        return Err(ValidationError::NotEnoughUsers {
            scenarios: simulation.scenarios.len(),
            users: user_count,
        });
    }
    if options.timeout.is_zero() {
        return Err(ValidationError::NonPositiveTimeout(0));
    }
    Ok(())
}

/// Runs `simulation` under `options`. Returns a stream of `ScenarioResult`s
/// and a force-stop handle, or a `ValidationError` before any task spawns
/// (spec §7).
pub async fn run(simulation: Simulation, options: SimulationOptions) -> Result<RunHandle, ValidationError> {
    validate(&simulation, &options)?;

    let user_ids: Vec<u64> = options
        .users
        .clone()
        .unwrap_or_else(|| (0..options.concurrency.unwrap_or(0) as u64).collect());

    let base_context = match &options.pre_hook {
        Some(hook) => options.context.merged(&hook.call(options.context.clone()).await),
        None => options.context.clone(),
    };

    let runner: Arc<dyn Runner> = match &options.runner {
        RunnerKind::Duration(duration) => Arc::new(DurationRunner { duration: *duration }),
        RunnerKind::RequestCount(total) => Arc::new(RequestCountRunner { total_requests: *total }),
        RunnerKind::FixedRuns(runs_per_user) => Arc::new(FixedRunsRunner {
            runs_per_user: *runs_per_user,
            user_count: user_ids.len() as u64,
        }),
    };

    let weights: Vec<u32> = simulation.scenarios.iter().map(|s| s.weight).collect();
    let allocations = splitter::split(&user_ids, &weights, options.rate);

    let counters = Arc::new(SharedCounters::for_scenarios(
        simulation.scenarios.iter().map(|s| s.name.clone()),
    ));
    let run_trackers: HashMap<String, Arc<RunTracker>> = simulation
        .scenarios
        .iter()
        .map(|s| (s.name.clone(), Arc::new(RunTracker::new())))
        .collect();

    let force_stop = Arc::new(ForceStop::new());
    let progress_tracker: Arc<dyn ProgressTracker> = options
        .progress_tracker
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressTracker));

    let start_instant = Instant::now();
    let (tx, rx) = mpsc::channel::<ScenarioResult>(1024);

    let mut handles = Vec::new();
    for (scenario, allocation) in simulation.scenarios.into_iter().zip(allocations.into_iter()) {
        let mut scenario = scenario;
        if scenario.concurrency_distribution.is_none() {
            scenario.concurrency_distribution = options.concurrency_distribution.clone();
        }
        if scenario.rate_distribution.is_none() {
            scenario.rate_distribution = options.rate_distribution.clone();
        }
        let scenario = Arc::new(scenario);
        let run_tracker = run_trackers.get(&scenario.name).expect("tracker allocated per scenario").clone();

        let scenario_rate = scenario.rate.or_else(|| allocation.rate.map(|r| r as f64));
        // Shared across every driver instance of this scenario: the in-flight
        // counter they poll against is scenario-wide, so the eligibility
        // target must be too (spec §4.6 — one target concurrency per
        // scenario, not per driver instance).
        let base_concurrency = allocation.user_ids.len() as f64;

        for user_id in allocation.user_ids {
            let sink = tx.clone();
            let scenario = Arc::clone(&scenario);
            let counters = Arc::clone(&counters);
            let runner = Arc::clone(&runner);
            let force_stop = Arc::clone(&force_stop);
            let base_context = base_context.clone();
            let timeout = options.timeout;

            let handle = if let Some(rate) = scenario_rate {
                let run_tracker = Arc::clone(&run_tracker);
                tokio::spawn(async move {
                    rate_driver::run(
                        scenario,
                        user_id,
                        rate,
                        base_context,
                        timeout,
                        counters,
                        run_tracker,
                        runner,
                        force_stop,
                        start_instant,
                        sink,
                    )
                    .await;
                })
            } else {
                let base_concurrency = base_concurrency;
                tokio::spawn(async move {
                    concurrency_driver::run(
                        scenario,
                        user_id,
                        base_concurrency,
                        base_context,
                        timeout,
                        counters,
                        runner,
                        force_stop,
                        start_instant,
                        sink,
                    )
                    .await;
                })
            };
            handles.push(handle);
        }
    }

    // Ticks the progress tracker on a fixed cadence while drivers are
    // running (spec §6: the tracker is "started" with references to the
    // counters, not invoked once at the very end) and stops as soon as the
    // supervisor below signals every driver has finished.
    let (done_tx, mut done_rx) = tokio::sync::oneshot::channel::<()>();
    let ticker_tracker = Arc::clone(&progress_tracker);
    let ticker_counters = Arc::clone(&counters);
    let ticker_force_stop = Arc::clone(&force_stop);
    let ticker_runner = Arc::clone(&runner);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut done_rx => break,
                _ = time::sleep(PROGRESS_TICK_INTERVAL) => {
                    let sent = ticker_counters.sent_requests.load(std::sync::atomic::Ordering::Relaxed);
                    let progress = ticker_runner.progress(sent, start_instant, Instant::now());
                    ticker_tracker.on_tick(&ProgressTrackerContext {
                        counters: Arc::clone(&ticker_counters),
                        force_stop: Arc::clone(&ticker_force_stop),
                        progress,
                    });
                }
            }
        }
    });

    // One extra sender clone kept alive by the supervisor: the caller's
    // stream must not close until shutdown has run post-hook and stopped
    // the progress tracker (spec §4.8 "Shutdown").
    let supervisor_sink = tx;
    let post_hook = simulation.post_hook;
    let supervisor_tracker = Arc::clone(&progress_tracker);
    let supervisor_counters = Arc::clone(&counters);
    let supervisor_force_stop = Arc::clone(&force_stop);
    let supervisor_context = base_context.clone();
    let supervisor_runner = Arc::clone(&runner);

    tokio::spawn(async move {
        for handle in handles {
            let _ = handle.await;
        }
        let _ = done_tx.send(());
        let sent = supervisor_counters.sent_requests.load(std::sync::atomic::Ordering::Relaxed);
        let progress = supervisor_runner.progress(sent, start_instant, Instant::now());
        supervisor_tracker.on_tick(&ProgressTrackerContext {
            counters: supervisor_counters,
            force_stop: supervisor_force_stop,
            progress,
        });
        supervisor_tracker.stop();
        if let Some(post_hook) = post_hook {
            post_hook.call(supervisor_context).await;
        }
        drop(supervisor_sink);
    });

    Ok(RunHandle {
        results: ReceiverStream::new(rx),
        force_stop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{Step, StepOutcome};
    use tokio_stream::StreamExt;

    fn ok_step(name: &str) -> Step {
        Step::new(
            name,
            Arc::new(|_ctx: Context| async move { Ok(StepOutcome::Value(true.into())) }),
        )
    }

    #[tokio::test]
    async fn rejects_simulation_with_no_scenarios() {
        let simulation = Simulation::new(vec![]);
        let mut options = SimulationOptions::new(RunnerKind::RequestCount(10));
        options.concurrency = Some(1);
        let result = run(simulation, options).await;
        assert_eq!(result.err(), Some(ValidationError::NoScenarios));
    }

    #[tokio::test]
    async fn rejects_empty_scenario() {
        let simulation = Simulation::new(vec![Scenario::new("empty", vec![])]);
        let mut options = SimulationOptions::new(RunnerKind::RequestCount(10));
        options.concurrency = Some(1);
        let result = run(simulation, options).await;
        assert_eq!(result.err(), Some(ValidationError::EmptyScenario("empty".to_string())));
    }

    #[tokio::test]
    async fn two_steps_one_user_duration_runner_streams_results() {
        let simulation = Simulation::new(vec![Scenario::new(
            "checkout",
            vec![ok_step("add_to_cart"), ok_step("pay")],
        )]);
        let mut options = SimulationOptions::new(RunnerKind::Duration(Duration::from_millis(200)));
        options.concurrency = Some(1);

        let handle = run(simulation, options).await.unwrap();
        let results: Vec<ScenarioResult> = handle.results.collect().await;

        assert!(!results.is_empty());
        for r in &results {
            assert_eq!(r.requests.len(), 2);
            assert!(r.success);
        }
    }

    #[tokio::test]
    async fn rate_conservation_across_two_weighted_scenarios() {
        let simulation = Simulation::new(vec![
            Scenario::new("browse", vec![ok_step("view")]).with_weight(1),
            Scenario::new("checkout", vec![ok_step("pay")]).with_weight(3),
        ]);
        let mut options = SimulationOptions::new(RunnerKind::Duration(Duration::from_millis(50)));
        options.users = Some((0..40).collect());

        let handle = run(simulation, options).await.unwrap();
        let _results: Vec<ScenarioResult> = handle.results.collect().await;
    }
}
