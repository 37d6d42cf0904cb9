//! Per-state behaviors and the registry they are resolved from.
//!
//! The application registers behaviors under `"<namespace>.<state>"`, where the
//! namespace is the state table's name. Resolution happens once, when the
//! machine is built; a state without an entry simply has no custom behavior.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::event::EventData;

/// Device-specific work performed when a state is entered or left.
pub trait StateBehavior: Send + Sync {
    fn on_enter(&self, event: &EventData<'_>) -> Result<()>;

    fn on_exit(&self, _event: &EventData<'_>) -> Result<()> {
        Ok(())
    }
}

/// Adapts a closure into an on-enter-only behavior.
pub struct FnBehavior<F>(pub F);

impl<F> StateBehavior for FnBehavior<F>
where
    F: Fn(&EventData<'_>) -> Result<()> + Send + Sync,
{
    fn on_enter(&self, event: &EventData<'_>) -> Result<()> {
        (self.0)(event)
    }
}

#[derive(Default, Clone)]
pub struct BehaviorRegistry {
    entries: HashMap<String, Arc<dyn StateBehavior>>,
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("BehaviorRegistry").field("entries", &keys).finish()
    }
}

fn key(namespace: &str, state: &str) -> String {
    format!("{namespace}.{state}")
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, namespace: &str, state: &str, behavior: Arc<dyn StateBehavior>) {
        self.entries.insert(key(namespace, state), behavior);
    }

    /// Register a closure as the on-enter behavior of `state`.
    pub fn register_fn<F>(&mut self, namespace: &str, state: &str, on_enter: F)
    where
        F: Fn(&EventData<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(namespace, state, Arc::new(FnBehavior(on_enter)));
    }

    pub fn resolve(&self, namespace: &str, state: &str) -> Option<Arc<dyn StateBehavior>> {
        let behavior = self.entries.get(&key(namespace, state)).cloned();
        if behavior.is_none() {
            debug!(namespace, state, "No behavior registered, state has no custom on_enter");
        }
        behavior
    }
}

/// A declared state and its resolved behavior. Immutable after construction.
#[derive(Clone)]
pub struct StateSpec {
    name: String,
    behavior: Option<Arc<dyn StateBehavior>>,
}

impl fmt::Debug for StateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSpec")
            .field("name", &self.name)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

impl StateSpec {
    /// Build a state, binding whatever behavior the registry holds for it.
    pub fn resolve(namespace: &str, name: &str, registry: &BehaviorRegistry) -> Self {
        Self {
            name: name.to_string(),
            behavior: registry.resolve(namespace, name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> Option<&Arc<dyn StateBehavior>> {
        self.behavior.as_ref()
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }
}
