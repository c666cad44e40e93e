//! Prometheus counters mirroring [`crate::state::SharedCounters`] (spec §3,
//! Design Notes "Global mutable state"), bumped alongside the atomic
//! counters at the same call sites (`step_executor`, `concurrency_driver`,
//! `rate_driver`) rather than read back out of them — the atomics stay the
//! single source of truth the scheduler reads for its own decisions, these
//! are a write-only mirror for an external scraper.
//!
//! Grounded in the teacher's `metrics.rs` `lazy_static!` registry pattern,
//! trimmed to drop the `hyper` scraping server — exposing an HTTP endpoint
//! is network transport, explicitly out of scope (spec §1 Non-goals). What
//! remains is register/gather: callers that already run their own HTTP
//! server (or just want a periodic textual dump) call
//! [`gather_metrics_string`] themselves.

use std::env;

use prometheus::{Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder, Encoder};

lazy_static::lazy_static! {
    pub static ref METRIC_NAMESPACE: String =
        env::var("METRIC_NAMESPACE").unwrap_or_else(|_| "gatling_core".to_string());

    pub static ref PREPARED_REQUESTS_TOTAL: IntCounter =
        IntCounter::with_opts(
            Opts::new("prepared_requests_total", "Scenario runs committed to a future rate-driver slot")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    pub static ref SENT_REQUESTS_TOTAL: IntCounter =
        IntCounter::with_opts(
            Opts::new("sent_requests_total", "Steps that actually started executing")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    pub static ref CONCURRENT_SCENARIOS: IntCounterVec =
        IntCounterVec::new(
            Opts::new("concurrent_scenario_starts_total", "Scenario iterations started, by scenario")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["scenario"]
        ).unwrap();

    pub static ref IN_FLIGHT_SCENARIOS: Gauge =
        Gauge::with_opts(
            Opts::new("in_flight_scenarios", "Scenario iterations currently running, summed across scenarios")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();
}

/// Registers all metrics with the default Prometheus registry. Call once
/// per process; registering twice returns an `AlreadyReg` error.
pub fn register_metrics() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    prometheus::default_registry().register(Box::new(PREPARED_REQUESTS_TOTAL.clone()))?;
    prometheus::default_registry().register(Box::new(SENT_REQUESTS_TOTAL.clone()))?;
    prometheus::default_registry().register(Box::new(CONCURRENT_SCENARIOS.clone()))?;
    prometheus::default_registry().register(Box::new(IN_FLIGHT_SCENARIOS.clone()))?;
    Ok(())
}

/// Gathers and encodes the default registry's metrics as Prometheus text
/// exposition format.
pub fn gather_metrics_string(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode metrics as UTF-8");
        String::from("# ERROR ENCODING METRICS TO UTF-8")
    })
}
