use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use super::event::EventData;
use super::transition::SAFETY_CHECK;

/// A named precondition. `Ok(false)` blocks the transition; `Err` is a fault.
pub type ConditionFn = dyn Fn(&EventData<'_>) -> Result<bool> + Send + Sync;

/// Condition checks by the names transitions refer to them with.
#[derive(Default, Clone)]
pub struct ConditionRegistry {
    checks: HashMap<String, Arc<ConditionFn>>,
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.checks.keys().collect();
        names.sort();
        f.debug_struct("ConditionRegistry").field("checks", &names).finish()
    }
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the mandatory safety check.
    pub fn with_safety<F>(check: F) -> Self
    where
        F: Fn(&EventData<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        let mut registry = Self::new();
        registry.register(SAFETY_CHECK, check);
        registry
    }

    pub fn register<F>(&mut self, name: &str, check: F) -> &mut Self
    where
        F: Fn(&EventData<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.checks.insert(name.to_string(), Arc::new(check));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ConditionFn>> {
        self.checks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::MachineControl;

    #[test]
    fn with_safety_registers_check_safety() {
        let registry = ConditionRegistry::with_safety(|_| Ok(false));
        let control = MachineControl::default();
        let event = EventData {
            event: "park",
            source: "ready",
            dest: "parking",
            control: &control,
        };

        assert!(registry.contains(SAFETY_CHECK));
        let check = registry.get(SAFETY_CHECK).unwrap();
        assert!(!check(&event).unwrap());
        assert!(registry.get("is_dark").is_none());
    }
}
