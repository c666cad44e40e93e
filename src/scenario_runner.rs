//! Scenario Runner (spec §4.5): walks one user's step sequence for a single
//! scenario iteration, applying hooks, the failure-skip policy, and
//! early-termination checks.
//!
//! Grounded in the teacher's `ScenarioExecutor::execute` loop (sequential
//! step iteration, per-step logging, aggregate timing) generalized from a
//! fixed `Vec<Step>` walk to the spec's step-source model: a fixed list
//! followed by an optional generator that is re-consulted until it yields
//! nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::error;

use crate::context::Context;
use crate::result::{RequestResult, ScenarioResult};
use crate::runner::Runner;
use crate::scenario::{Scenario, Step};
use crate::state::{ForceStop, SharedCounters};
use crate::step_executor;

/// Runs `scenario` once for `user_id` and returns the resulting
/// [`ScenarioResult`].
///
/// `allow_early_termination_check` is called once per step to ask whether
/// the Runner says to stop; it is consulted only when
/// `scenario.allow_early_termination` is true, matching spec §4.5's
/// termination condition list.
#[allow(clippy::too_many_arguments)]
pub async fn run_once(
    scenario: &Scenario,
    user_id: u64,
    base_context: &Context,
    timeout: Duration,
    counters: &SharedCounters,
    runner: &Arc<dyn Runner>,
    force_stop: &ForceStop,
    sent_at_start: u64,
    start_instant: Instant,
) -> ScenarioResult {
    let mut context = base_context.merged(&scenario.context);

    if let Some(pre_hook) = &scenario.pre_hook {
        context = pre_hook.call(context).await;
    }

    let mut remaining_steps: std::collections::VecDeque<Step> = scenario.steps.iter().cloned().collect();
    let mut results: Vec<RequestResult> = Vec::new();

    loop {
        let step = match next_step(&mut remaining_steps, &scenario.generator, &mut context).await {
            Some(step) => step,
            None => break,
        };

        let (result, context_after) =
            step_executor::execute(&step, timeout, &context, user_id, counters).await;
        context = context_after;

        let failed = !result.result;
        if failed {
            if let Some(exception) = &result.exception {
                error!(scenario = %scenario.name, step = %step.name, %user_id, exception, "step failed");
            }
        }
        results.push(result);

        if failed && scenario.skip_next_after_failure {
            break;
        }
        if scenario.allow_early_termination
            && !runner.should_continue(sent_at_start, start_instant, Instant::now())
        {
            break;
        }
        if force_stop.is_triggered() {
            break;
        }
    }

    if let Some(post_hook) = &scenario.post_hook {
        context = post_hook.call(context).await;
    }
    let _ = context;

    ScenarioResult::new(scenario.name.clone(), user_id, results)
}

/// `next-step` from spec §4.5: pop the fixed list first, then fall back to
/// re-consulting the generator until it returns `None`.
async fn next_step(
    remaining_steps: &mut std::collections::VecDeque<Step>,
    generator: &Option<Arc<dyn crate::scenario::StepGenerator>>,
    context: &mut Context,
) -> Option<Step> {
    if let Some(step) = remaining_steps.pop_front() {
        return Some(step);
    }
    let generator = generator.as_ref()?;
    let generated = generator.next(context).await?;
    if let Some(new_context) = generated.context {
        *context = new_context;
    }
    Some(generated.step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RequestCountRunner;
    use crate::scenario::StepOutcome;
    use std::sync::Arc;

    fn ok_step(name: &str) -> Step {
        Step::new(
            name,
            Arc::new(|_ctx: Context| async move { Ok(StepOutcome::Value(true.into())) }),
        )
    }

    fn failing_step(name: &str) -> Step {
        Step::new(
            name,
            Arc::new(|_ctx: Context| async move { Ok(StepOutcome::Value(false.into())) }),
        )
    }

    fn harness() -> (SharedCounters, Arc<dyn Runner>, ForceStop, Instant) {
        (
            SharedCounters::new(),
            Arc::new(RequestCountRunner { total_requests: 1000 }),
            ForceStop::new(),
            Instant::now(),
        )
    }

    #[tokio::test]
    async fn two_steps_both_succeed_produce_two_ordered_results() {
        let scenario = Scenario::new("checkout", vec![ok_step("s1"), ok_step("s2")]);
        let (counters, runner, force_stop, start) = harness();
        let result = run_once(
            &scenario,
            1,
            &Context::new(),
            Duration::from_secs(1),
            &counters,
            &runner,
            &force_stop,
            0,
            start,
        )
        .await;

        assert_eq!(result.requests.len(), 2);
        assert_eq!(result.requests[0].name, "s1");
        assert_eq!(result.requests[1].name, "s2");
        assert!(result.requests[0].start <= result.requests[1].start);
        assert_eq!(result.end, result.requests[1].end);
        assert!(result.success);
    }

    #[tokio::test]
    async fn failure_stops_scenario_when_skip_next_after_failure_default() {
        let scenario = Scenario::new("checkout", vec![failing_step("s1"), ok_step("s2")]);
        let (counters, runner, force_stop, start) = harness();
        let result = run_once(
            &scenario,
            1,
            &Context::new(),
            Duration::from_secs(1),
            &counters,
            &runner,
            &force_stop,
            0,
            start,
        )
        .await;

        assert_eq!(result.requests.len(), 1);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn skip_next_after_failure_false_continues_past_failure() {
        let mut scenario = Scenario::new("checkout", vec![failing_step("s1"), ok_step("s2")]);
        scenario.skip_next_after_failure = false;
        let (counters, runner, force_stop, start) = harness();
        let result = run_once(
            &scenario,
            1,
            &Context::new(),
            Duration::from_secs(1),
            &counters,
            &runner,
            &force_stop,
            0,
            start,
        )
        .await;

        assert_eq!(result.requests.len(), 2);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn force_stop_halts_after_current_step() {
        let scenario = Scenario::new("checkout", vec![ok_step("s1"), ok_step("s2"), ok_step("s3")]);
        let (counters, runner, force_stop, start) = harness();
        force_stop.trigger();
        let result = run_once(
            &scenario,
            1,
            &Context::new(),
            Duration::from_secs(1),
            &counters,
            &runner,
            &force_stop,
            0,
            start,
        )
        .await;

        assert_eq!(result.requests.len(), 1);
    }
}
