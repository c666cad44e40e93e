//! Step Executor (spec §4.4): runs one scenario step with a timeout and
//! produces a normalised [`RequestResult`].
//!
//! Grounded in the teacher's `executor::ScenarioExecutor::execute_step`: a
//! per-step timer, metrics bump on entry, structured log on failure. The
//! teacher raced a timeout against `reqwest`'s own request future; here the
//! race is against the step's opaque `request` callback future, spawned onto
//! its own task so a timeout can walk away from it cleanly (the spec's
//! "orphaned timeout" — the in-flight callback keeps running in the
//! background, its result discarded).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::clock;
use crate::context::Context;
use crate::metrics;
use crate::result::RequestResult;
use crate::scenario::{Step, StepOutcome};
use crate::state::SharedCounters;

/// Runs `step` against `context` for `user_id`, enforcing `timeout`.
///
/// Always returns a `RequestResult` — a step panic, a step error, and a
/// timeout are all folded into `result: false` records rather than
/// propagated (spec §7: "the Step Executor never throws to its caller").
/// Returns the result plus the context to carry into the next step.
pub async fn execute(
    step: &Step,
    timeout: Duration,
    context: &Context,
    user_id: u64,
    counters: &SharedCounters,
) -> (RequestResult, Context) {
    counters.sent_requests.fetch_add(1, Ordering::Relaxed);
    metrics::SENT_REQUESTS_TOTAL.inc();

    if let Some(sleep_before) = &step.sleep_before {
        let ms = sleep_before.ms(context).await;
        if ms > 0 {
            time::sleep(Duration::from_millis(ms)).await;
        }
    }

    let ctx_for_call = context.clone().with_user_id(user_id);
    let start_wall = clock::now_ms();
    let start = Instant::now();

    let callback = Arc::clone(&step.request);
    let join_handle = tokio::spawn(async move { callback.call(ctx_for_call).await });

    tokio::select! {
        biased;
        joined = join_handle => {
            let end_wall = clock::now_ms().max(start_wall);
            let _elapsed = Instant::now().saturating_duration_since(start);
            let (outcome, context_after) = normalize(joined, context, &step.name);
            let result = match outcome {
                Ok(success) => RequestResult {
                    name: step.name.clone(),
                    id: user_id,
                    start: start_wall,
                    end: end_wall,
                    result: success,
                    context_before: context.clone(),
                    context_after: context_after.clone(),
                    exception: None,
                },
                Err(exception) => {
                    debug!(step = %step.name, %user_id, exception = %exception, "step raised an exception");
                    RequestResult {
                        name: step.name.clone(),
                        id: user_id,
                        start: start_wall,
                        end: end_wall,
                        result: false,
                        context_before: context.clone(),
                        context_after: context_after.clone(),
                        exception: Some(exception),
                    }
                }
            };
            (result, context_after)
        }
        _ = time::sleep(timeout) => {
            let end_wall = start_wall + timeout.as_millis() as u64;
            warn!(step = %step.name, %user_id, timeout_ms = timeout.as_millis(), "step timed out");
            (
                RequestResult::failure(
                    step.name.clone(),
                    user_id,
                    start_wall,
                    end_wall,
                    context.clone(),
                    "request timed out",
                ),
                context.clone(),
            )
        }
    }
}

/// Normalises a joined step callback outcome into `(result, context-after)`.
///
/// A `JoinError` (the callback's task panicked) is treated the same as a
/// caught synchronous exception (spec §4.4 step 7). A callback `Err` is
/// likewise a caught exception. A callback `Ok` is parsed per step 5: a
/// `WithContext` outcome carries a replacement context forward, otherwise
/// the input context is carried forward unchanged.
fn normalize(
    joined: Result<Result<StepOutcome, String>, tokio::task::JoinError>,
    input_context: &Context,
    step_name: &str,
) -> (Result<bool, String>, Context) {
    match joined {
        Err(join_error) => {
            debug!(step = step_name, error = %join_error, "step callback panicked");
            (Err(join_error.to_string()), input_context.clone())
        }
        Ok(Err(exception)) => (Err(exception), input_context.clone()),
        Ok(Ok(StepOutcome::Value(value))) => (Ok(truthy(&value)), input_context.clone()),
        Ok(Ok(StepOutcome::WithContext(value, new_context))) => (Ok(truthy(&value)), new_context),
    }
}

/// `parse(v)` from spec §4.4 step 5: truthiness of a JSON value.
fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(_) => true,
    }
}
