//! Validation errors surfaced at orchestrator entry (spec §7).
//!
//! The teacher's `errors.rs` classified HTTP/reqwest failures for metrics
//! labeling; this engine has no transport layer of its own, so that
//! taxonomy is replaced with the one failure category the spec assigns to
//! the orchestrator itself: a malformed `Simulation` rejected before any
//! driver task is spawned. Runtime step/timeout failures are not errors —
//! they are encoded directly into `RequestResult` (see `result.rs`).

use thiserror::Error;

/// Rejects a `Simulation`/`Options` pair before any worker starts (spec §7,
/// "Validation error").
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("simulation has no scenarios")]
    NoScenarios,

    #[error("scenario '{0}' has neither steps nor a step generator")]
    EmptyScenario(String),

    #[error("scenario weights must be positive integers, got {0} for scenario '{1}'")]
    NonPositiveWeight(u32, String),

    #[error("more scenarios ({scenarios}) than users ({users}); every scenario needs at least one user")]
    NotEnoughUsers { scenarios: usize, users: usize },

    #[error("options must select exactly one of duration, request-count, or fixed-runs")]
    AmbiguousRunner,

    #[error("timeout-in-ms must be positive, got {0}")]
    NonPositiveTimeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let err = ValidationError::EmptyScenario("checkout".to_string());
        assert_eq!(err.to_string(), "scenario 'checkout' has neither steps nor a step generator");
    }
}
