//! Scenario and step definitions: the user-facing shape of a simulation.
//!
//! A step is an opaque callback — the engine has no opinion on what it
//! actually does, only on how its result is shaped (see [`StepOutcome`]).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;

/// What a step's `request` callback can return after normalisation.
pub enum StepOutcome {
    /// Just a value; the context carries forward unchanged.
    Value(serde_json::Value),
    /// A value paired with a replacement context for subsequent steps.
    WithContext(serde_json::Value, Context),
}

/// The textual form of a caught step exception.
pub type StepException = String;

/// A scenario step's request callback.
///
/// Every implementation already returns a `Future`, so there is no separate
/// synchronous/awaitable branch to detect. Returning `Err` is the analogue
/// of a synchronous exception thrown by the callback; a genuine Rust panic
/// inside `call` is caught separately by the Step Executor
/// (see `step_executor.rs`).
#[async_trait]
pub trait StepCallback: Send + Sync {
    async fn call(&self, ctx: Context) -> Result<StepOutcome, StepException>;
}

#[async_trait]
impl<F, Fut> StepCallback for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<StepOutcome, StepException>> + Send,
{
    async fn call(&self, ctx: Context) -> Result<StepOutcome, StepException> {
        (self)(ctx).await
    }
}

/// A step's optional `sleep-before` callback: milliseconds to pause before
/// invoking `request`, computed from the context at the time.
#[async_trait]
pub trait SleepBefore: Send + Sync {
    async fn ms(&self, ctx: &Context) -> u64;
}

#[async_trait]
impl<F, Fut> SleepBefore for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = u64> + Send,
{
    async fn ms(&self, ctx: &Context) -> u64 {
        (self)(ctx.clone()).await
    }
}

/// A single step within a scenario.
pub struct Step {
    pub name: String,
    pub request: Arc<dyn StepCallback>,
    pub sleep_before: Option<Arc<dyn SleepBefore>>,
}

impl Step {
    pub fn new(name: impl Into<String>, request: Arc<dyn StepCallback>) -> Self {
        Self {
            name: name.into(),
            request,
            sleep_before: None,
        }
    }

    pub fn with_sleep_before(mut self, sleep_before: Arc<dyn SleepBefore>) -> Self {
        self.sleep_before = Some(sleep_before);
        self
    }
}

impl Clone for Step {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            request: Arc::clone(&self.request),
            sleep_before: self.sleep_before.clone(),
        }
    }
}

/// A step yielded by a generator, optionally with a replacement context.
pub struct GeneratedStep {
    pub step: Step,
    pub context: Option<Context>,
}

/// A scenario's dynamic step source. Invoked once the fixed `steps` list is
/// exhausted and re-consulted until it returns `None`, which terminates the
/// walk.
#[async_trait]
pub trait StepGenerator: Send + Sync {
    async fn next(&self, ctx: &Context) -> Option<GeneratedStep>;
}

/// `pre-hook`/`post-hook` at both the simulation and scenario level.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, ctx: Context) -> Context;
}

#[async_trait]
impl<F, Fut> Hook for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Context> + Send,
{
    async fn call(&self, ctx: Context) -> Context {
        (self)(ctx).await
    }
}

/// Concurrency/rate shaping callback.
///
/// Modeled as a tagged two-variant enum rather than dispatching on a
/// callback's runtime arity: both shapes are real, distinct constructors,
/// and the test suite exercises both (see `orchestrator.rs` tests).
#[derive(Clone)]
pub enum Distribution {
    /// `(progress) -> multiplier`
    ProgressOnly(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
    /// `(progress, context) -> multiplier`
    WithContext(Arc<dyn Fn(f64, &Context) -> f64 + Send + Sync>),
}

impl Distribution {
    pub fn progress_only(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self::ProgressOnly(Arc::new(f))
    }

    pub fn with_context(f: impl Fn(f64, &Context) -> f64 + Send + Sync + 'static) -> Self {
        Self::WithContext(Arc::new(f))
    }

    /// Evaluate the multiplier for the given progress fraction, ignoring
    /// `duration` for now (the source passes it through but neither built-in
    /// shape needs it; user callbacks that do can close over their own clock).
    pub fn eval(&self, progress: f64, _duration: Duration, ctx: &Context) -> f64 {
        match self {
            Distribution::ProgressOnly(f) => f(progress),
            Distribution::WithContext(f) => f(progress, ctx),
        }
    }
}

/// A named, weighted user-journey: an ordered composition of steps executed
/// once per assigned virtual user, per iteration of its driver.
pub struct Scenario {
    pub name: String,
    /// Relative traffic share; default 1.
    pub weight: u32,
    pub steps: Vec<Step>,
    pub generator: Option<Arc<dyn StepGenerator>>,
    pub context: Context,
    pub pre_hook: Option<Arc<dyn Hook>>,
    pub post_hook: Option<Arc<dyn Hook>>,
    /// Stop early if the Runner says to, even mid-scenario.
    pub allow_early_termination: bool,
    /// Stop the scenario after the first failed step. Defaults to true.
    pub skip_next_after_failure: bool,
    /// Target arrivals/sec for this scenario; `None` means concurrency-driven.
    pub rate: Option<f64>,
    pub concurrency_distribution: Option<Distribution>,
    pub rate_distribution: Option<Distribution>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            weight: 1,
            steps,
            generator: None,
            context: Context::new(),
            pre_hook: None,
            post_hook: None,
            allow_early_termination: false,
            skip_next_after_failure: true,
            rate: None,
            concurrency_distribution: None,
            rate_distribution: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn StepGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// True when this scenario has nothing to run — no fixed steps and no
    /// generator. Checked by orchestrator validation.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.generator.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_step(name: &str) -> Step {
        Step::new(
            name,
            Arc::new(|_ctx: Context| async move { Ok(StepOutcome::Value(true.into())) }),
        )
    }

    #[test]
    fn scenario_defaults() {
        let s = Scenario::new("checkout", vec![ok_step("add_to_cart")]);
        assert_eq!(s.weight, 1);
        assert!(s.skip_next_after_failure);
        assert!(!s.allow_early_termination);
        assert!(s.rate.is_none());
        assert!(!s.is_empty());
    }

    #[test]
    fn scenario_with_no_steps_and_no_generator_is_empty() {
        let s = Scenario::new("nothing", vec![]);
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn closure_step_callback_runs() {
        let step = ok_step("ping");
        let outcome = step.request.call(Context::new()).await.unwrap();
        match outcome {
            StepOutcome::Value(v) => assert_eq!(v, serde_json::Value::Bool(true)),
            StepOutcome::WithContext(..) => panic!("expected plain value"),
        }
    }

    #[test]
    fn distribution_progress_only_shape() {
        let d = Distribution::progress_only(|p| 1.0 + p);
        let m = d.eval(0.5, Duration::from_secs(1), &Context::new());
        assert!((m - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn distribution_with_context_shape() {
        let d = Distribution::with_context(|p, ctx| {
            let boost = ctx.get("boost").and_then(|v| v.as_f64()).unwrap_or(0.0);
            p + boost
        });
        let ctx = Context::new().with("boost", 2.0);
        let m = d.eval(0.25, Duration::from_secs(1), &ctx);
        assert!((m - 2.25).abs() < f64::EPSILON);
    }
}
