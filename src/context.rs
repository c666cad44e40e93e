//! The per-step execution context.
//!
//! A context is a dynamic, string-keyed bag of JSON-shaped values rather than a
//! fixed struct, because scenarios and their steps are supplied by the caller and
//! the engine has no business assuming which keys they use: one step can hand
//! the next a parsed id or a nested object without round-tripping through
//! strings.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// The reserved key under which the Step Executor stores the acting user id
/// before invoking a step's request callback.
pub const USER_ID_KEY: &str = "user_id";

/// A snapshot of scenario state passed by value between steps.
///
/// Contexts are immutable snapshots: every mutating method returns a new
/// `Context` rather than mutating in place. `#[serde(transparent)]` so a
/// `context-before`/`context-after` field on `RequestResult` serializes as
/// the plain JSON object a caller would expect, not a wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context(HashMap<String, Value>);

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Build a context from an existing map.
    pub fn from_map(map: HashMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a new context with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns a new context with the acting user id recorded under
    /// [`USER_ID_KEY`].
    pub fn with_user_id(self, id: u64) -> Self {
        self.with(USER_ID_KEY, id)
    }

    /// Merges `overlay` on top of `self`: keys in `overlay` win on conflict.
    ///
    /// Used both to merge a scenario's base context with the run's top-level
    /// context, and to merge the options context with the result of a
    /// top-level pre-hook.
    pub fn merged(&self, overlay: &Context) -> Context {
        let mut merged = self.0.clone();
        for (k, v) in &overlay.0 {
            merged.insert(k.clone(), v.clone());
        }
        Context(merged)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> HashMap<String, Value> {
        self.0
    }

    pub fn as_map(&self) -> &HashMap<String, Value> {
        &self.0
    }
}

impl From<HashMap<String, Value>> for Context {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}
