//! Result types emitted by a run: one [`RequestResult`] per step, rolled up
//! into one [`ScenarioResult`] per scenario iteration (spec §3 data model).
//!
//! Both derive `Serialize` so the orchestrator's result stream can be piped
//! straight into a reporting sink without an intermediate conversion. Fields
//! the spec marks optional use `skip_serializing_if` so an absent key is
//! omitted from the JSON rather than serialized as `null` (spec §3
//! invariant).

use serde::Serialize;

use crate::context::Context;

/// Outcome of a single step invocation (spec §3: `{name, id, start, end,
/// result, context-before, context-after, exception?}`).
#[derive(Debug, Clone, Serialize)]
pub struct RequestResult {
    pub name: String,
    pub id: u64,
    /// Milliseconds since the Unix epoch.
    pub start: u64,
    /// Milliseconds since the Unix epoch. Invariant: `end >= start`.
    pub end: u64,
    pub result: bool,
    pub context_before: Context,
    pub context_after: Context,
    /// Present only on failure; absent keys are omitted rather than `null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl RequestResult {
    /// A timed-out or otherwise failed step: `context_after` carries the
    /// input context forward unchanged, matching spec §4.4 step 6 ("carry
    /// the original context forward").
    pub fn failure(
        name: impl Into<String>,
        id: u64,
        start: u64,
        end: u64,
        context_before: Context,
        exception: impl Into<String>,
    ) -> Self {
        let context_after = context_before.clone();
        Self {
            name: name.into(),
            id,
            start,
            end,
            result: false,
            context_before,
            context_after,
            exception: Some(exception.into()),
        }
    }
}

/// Outcome of one full scenario iteration (spec §3: `{name, id, start, end,
/// requests}`, where `start` is the first request's start and `end` the
/// last request's end).
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub id: u64,
    pub start: u64,
    pub end: u64,
    pub requests: Vec<RequestResult>,
    /// Not in the spec's literal field list but a natural, cheap-to-derive
    /// aggregate (true iff every constituent step succeeded) that a
    /// reporting sink built on this crate would otherwise have to recompute
    /// from `requests` itself.
    pub success: bool,
}

impl ScenarioResult {
    /// Builds the aggregate from per-step results. `requests` must be
    /// non-empty — the Scenario Runner always executes at least one step
    /// before emitting a result (spec §4.5's walk only terminates with zero
    /// results if the very first `next-step` call yields `None`, which
    /// validation rejects via `Scenario::is_empty`).
    pub fn new(name: impl Into<String>, id: u64, requests: Vec<RequestResult>) -> Self {
        let start = requests.first().map(|r| r.start).unwrap_or_else(crate::clock::now_ms);
        let end = requests.last().map(|r| r.end).unwrap_or(start);
        let success = requests.iter().all(|r| r.result);
        Self {
            name: name.into(),
            id,
            start,
            end,
            requests,
            success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_request(name: &str, id: u64, start: u64, end: u64) -> RequestResult {
        RequestResult {
            name: name.to_string(),
            id,
            start,
            end,
            result: true,
            context_before: Context::new(),
            context_after: Context::new(),
            exception: None,
        }
    }

    #[test]
    fn exception_is_omitted_on_success() {
        let r = ok_request("login", 1, 0, 5);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("exception").is_none());
    }

    #[test]
    fn exception_is_present_on_failure() {
        let r = RequestResult::failure("login", 1, 0, 5, Context::new(), "timed out");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json.get("exception").unwrap(), "timed out");
    }

    #[test]
    fn scenario_success_requires_every_step_to_succeed() {
        let requests = vec![
            ok_request("a", 7, 0, 1),
            RequestResult::failure("b", 7, 1, 2, Context::new(), "boom"),
        ];
        let result = ScenarioResult::new("checkout", 7, requests);
        assert!(!result.success);
    }

    #[test]
    fn scenario_success_when_all_steps_succeed() {
        let requests = vec![ok_request("a", 7, 0, 1), ok_request("b", 7, 1, 3)];
        let result = ScenarioResult::new("checkout", 7, requests);
        assert!(result.success);
    }

    #[test]
    fn scenario_start_end_bracket_first_and_last_request() {
        let requests = vec![ok_request("a", 1, 100, 110), ok_request("b", 1, 110, 140)];
        let result = ScenarioResult::new("checkout", 1, requests);
        assert_eq!(result.start, 100);
        assert_eq!(result.end, 140);
    }
}
