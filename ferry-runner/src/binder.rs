//! Target binding
//!
//! A [`Binder`] turns a task target into something callable. The runner does
//! not care how: [`StaticBinder`] looks targets up in a registry of Rust
//! closures, `LuaBinder` loads script modules from disk.

use std::collections::HashMap;
use std::sync::Arc;

use ferry_core::domain::target::TaskTarget;
use serde_json::{Map, Value as JsonValue};

use crate::invocation::RunnerError;

/// A bound, callable target
pub trait Invocable {
    /// Call the target
    ///
    /// # Returns
    /// The target's result; `Null` when it returned nothing
    fn invoke(
        &self,
        args: &[JsonValue],
        kwargs: &Map<String, JsonValue>,
    ) -> anyhow::Result<JsonValue>;
}

impl<F> Invocable for F
where
    F: Fn(&[JsonValue], &Map<String, JsonValue>) -> anyhow::Result<JsonValue>,
{
    fn invoke(
        &self,
        args: &[JsonValue],
        kwargs: &Map<String, JsonValue>,
    ) -> anyhow::Result<JsonValue> {
        self(args, kwargs)
    }
}

/// Resolves targets to invocables
pub trait Binder {
    fn bind(&self, target: &TaskTarget) -> Result<Arc<dyn Invocable>, RunnerError>;
}

/// Registry of in-process targets keyed by canonical `module:attribute`
#[derive(Default)]
pub struct StaticBinder {
    targets: HashMap<String, Arc<dyn Invocable + Send + Sync>>,
}

impl StaticBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `invocable` under `target` (either accepted target form)
    pub fn register<I>(mut self, target: &str, invocable: I) -> Result<Self, RunnerError>
    where
        I: Invocable + Send + Sync + 'static,
    {
        let target = TaskTarget::parse(target)
            .map_err(|e| RunnerError::InvalidInvocation(e.to_string()))?;
        self.targets.insert(target.canonical(), Arc::new(invocable));
        Ok(self)
    }
}

impl Binder for StaticBinder {
    fn bind(&self, target: &TaskTarget) -> Result<Arc<dyn Invocable>, RunnerError> {
        match self.targets.get(&target.canonical()) {
            Some(invocable) => Ok(invocable.clone()),
            None => Err(RunnerError::bind(target, "no such target is registered")),
        }
    }
}
