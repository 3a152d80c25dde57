//! Factories the scheduler uses to instantiate strategies and activities by
//! name (spec §3, §4.3 "StrategyFactory", "ActivityFactory").

use std::collections::HashMap;
use std::sync::Arc;

use crate::activity::strategy::ActivityStrategyActor;
use crate::model::operations::Operations;

/// Builds a fresh [`ActivityStrategyActor`] for a strategy type name.
///
/// Strategies are looked up by name rather than matched on a closed enum,
/// so new strategy types can register themselves without touching the
/// scheduler (spec §9, "Dynamic dispatch of activity types").
pub type StrategyFactory = Arc<dyn Fn() -> ActivityStrategyActor + Send + Sync>;

/// Describes one registered strategy type: its factory and whether it
/// consumes targets from the target selector (spec §4.3).
#[derive(Clone)]
pub struct StrategyRegistration {
    pub factory: StrategyFactory,
    pub uses_targets: bool,
    pub default_operations: Operations,
}

/// A name-keyed registry of strategy types the scheduler can instantiate.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    entries: HashMap<String, StrategyRegistration>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, registration: StrategyRegistration) {
        self.entries.insert(name.into(), registration);
    }

    pub fn get(&self, name: &str) -> Option<&StrategyRegistration> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_starts_empty() {
        let registry = StrategyRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("target-obs").is_none());
    }

    #[test]
    fn register_and_look_up_by_name() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "target-obs",
            StrategyRegistration {
                factory: Arc::new(ActivityStrategyActor::new_idle),
                uses_targets: true,
                default_operations: Operations::USE_DX | Operations::POINT_AT_TARGETS,
            },
        );
        let found = registry.get("target-obs").unwrap();
        assert!(found.uses_targets);
        assert!(found.default_operations.contains(Operations::USE_DX));
    }
}
