use crate::strategy::{momentum, StrategyFactory};
use std::collections::HashMap;

/// Process-wide registry mapping strategy keys to factories.
///
/// The compiled-in strategy set registers through [`StrategyRegistry::builtin`];
/// a manifest entry naming an unregistered key is logged and skipped by the
/// manager rather than failing the load.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in strategies.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("momentum", momentum::factory);
        registry
    }

    pub fn register(&mut self, key: impl Into<String>, factory: StrategyFactory) {
        self.factories.insert(key.into(), factory);
    }

    pub fn get(&self, key: &str) -> Option<StrategyFactory> {
        self.factories.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registers_momentum() {
        let registry = StrategyRegistry::builtin();
        assert!(registry.contains("momentum"));
        assert!(!registry.contains("does-not-exist"));
    }
}
