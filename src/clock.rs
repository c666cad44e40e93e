//! Clock & Timer (spec §4.1): monotonic "now" for result timestamps, plus
//! cancellable sleep.
//!
//! `now_ms()` is the wall-clock timestamp recorded on every `RequestResult`
//! (spec §3 data model), grounded in the teacher's own `${timestamp}`
//! substitution in `scenario.rs` (`SystemTime::now().duration_since(UNIX_EPOCH)`).
//! This is independent of the monotonic `tokio::time::Instant` clock the
//! drivers and Runner use internally for scheduling math (interval pacing,
//! elapsed-duration comparisons) — that one never needs to be epoch-relative
//! and `Instant` is the correct tool for it.
//!
//! Cancellable sleep needs no dedicated type: racing `tokio::time::sleep`
//! against another branch of a `select!` and letting the loser drop is
//! exactly the "never leaks a scheduled wake past simulation end" guarantee
//! the spec asks for (see `step_executor::execute`'s timeout race).

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonically_nondecreasing_across_calls() {
        let first = now_ms();
        let second = now_ms();
        assert!(second >= first);
    }
}
