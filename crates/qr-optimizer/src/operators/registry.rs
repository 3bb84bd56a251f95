//! Name → constructor tables for operators and objectives.

use qr_types::{ConfigError, EntryKey, QrResult, SlotKey};
use std::collections::BTreeMap;

use super::{
    CrossoverFunction, MutationFunction, PooledCrossover, PooledMutation, PositionalCrossover,
    PositionalMutation,
};
use crate::config::{ObjectiveConfig, SearchConfig};
use crate::ranker::{EntryRanker, ObjectiveFunction, SimpleObjective, TargetObjective};

type CrossoverCtor<K> = Box<dyn Fn() -> Box<dyn CrossoverFunction<K>> + Send + Sync>;
type MutationCtor<K> = Box<dyn Fn() -> Box<dyn MutationFunction<K>> + Send + Sync>;
type ObjectiveCtor<K> =
    Box<dyn Fn(&ObjectiveConfig) -> QrResult<Box<dyn ObjectiveFunction<K>>> + Send + Sync>;

/// Looks up crossover functions, mutation functions and objectives by the
/// names used in [`SearchConfig`].
pub struct OperatorRegistry<K: EntryKey> {
    crossovers: BTreeMap<String, CrossoverCtor<K>>,
    mutations: BTreeMap<String, MutationCtor<K>>,
    objectives: BTreeMap<String, ObjectiveCtor<K>>,
}

impl<K: EntryKey> OperatorRegistry<K> {
    /// Registry knowing only the key-independent objectives ("simple" and
    /// "target").
    pub fn new() -> Self {
        let mut registry = Self {
            crossovers: BTreeMap::new(),
            mutations: BTreeMap::new(),
            objectives: BTreeMap::new(),
        };
        registry.register_objective("simple", |_| Ok(Box::new(SimpleObjective)));
        registry.register_objective("target", |config| {
            let target = config.target.ok_or_else(|| ConfigError::Invalid {
                message: "objective \"target\" requires a target value".to_string(),
            })?;
            if !target.is_finite() {
                return Err(ConfigError::out_of_range("objective.target", target, "finite").into());
            }
            Ok(Box::new(TargetObjective::new(target)))
        });
        registry
    }

    pub fn register_crossover<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> Box<dyn CrossoverFunction<K>> + Send + Sync + 'static,
    {
        self.crossovers.insert(name.to_string(), Box::new(ctor));
    }

    pub fn register_mutation<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> Box<dyn MutationFunction<K>> + Send + Sync + 'static,
    {
        self.mutations.insert(name.to_string(), Box::new(ctor));
    }

    pub fn register_objective<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn(&ObjectiveConfig) -> QrResult<Box<dyn ObjectiveFunction<K>>> + Send + Sync + 'static,
    {
        self.objectives.insert(name.to_string(), Box::new(ctor));
    }

    pub fn crossover(&self, name: &str) -> QrResult<Box<dyn CrossoverFunction<K>>> {
        let ctor = self
            .crossovers
            .get(name)
            .ok_or_else(|| unknown("crossover", name, self.crossovers.keys()))?;
        Ok(ctor())
    }

    pub fn mutation(&self, name: &str) -> QrResult<Box<dyn MutationFunction<K>>> {
        let ctor = self
            .mutations
            .get(name)
            .ok_or_else(|| unknown("mutation", name, self.mutations.keys()))?;
        Ok(ctor())
    }

    pub fn objective(&self, config: &ObjectiveConfig) -> QrResult<Box<dyn ObjectiveFunction<K>>> {
        let ctor = self
            .objectives
            .get(&config.name)
            .ok_or_else(|| unknown("objective", &config.name, self.objectives.keys()))?;
        ctor(config)
    }

    /// Ranker for the objective and direction named in `config`.
    pub fn ranker(&self, config: &SearchConfig) -> QrResult<EntryRanker<K>> {
        Ok(EntryRanker::new(
            self.objective(&config.objective)?,
            config.direction,
        ))
    }

    pub fn crossover_names(&self) -> Vec<&str> {
        self.crossovers.keys().map(String::as_str).collect()
    }

    pub fn mutation_names(&self) -> Vec<&str> {
        self.mutations.keys().map(String::as_str).collect()
    }

    pub fn objective_names(&self) -> Vec<&str> {
        self.objectives.keys().map(String::as_str).collect()
    }
}

impl OperatorRegistry<SlotKey> {
    /// Registry with the bundled slot operators under "pooled" and
    /// "positional".
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_crossover("pooled", || Box::new(PooledCrossover::default()));
        registry.register_crossover("positional", || Box::new(PositionalCrossover::default()));
        registry.register_mutation("pooled", || Box::new(PooledMutation::default()));
        registry.register_mutation("positional", || Box::new(PositionalMutation::default()));
        registry
    }
}

impl<K: EntryKey> Default for OperatorRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntryKey> std::fmt::Debug for OperatorRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("crossovers", &self.crossover_names())
            .field("mutations", &self.mutation_names())
            .field("objectives", &self.objective_names())
            .finish()
    }
}

fn unknown<'a>(kind: &str, name: &str, known: impl Iterator<Item = &'a String>) -> ConfigError {
    ConfigError::UnknownOperator {
        kind: kind.to_string(),
        name: name.to_string(),
        known: known.map(String::as_str).collect::<Vec<_>>().join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qr_types::{Entry, QrError};

    #[test]
    fn defaults_are_registered() {
        let registry = OperatorRegistry::with_defaults();
        assert_eq!(registry.crossover_names(), vec!["pooled", "positional"]);
        assert_eq!(registry.mutation_names(), vec!["pooled", "positional"]);
        assert_eq!(registry.objective_names(), vec!["simple", "target"]);
        assert_eq!(registry.crossover("pooled").unwrap().name(), "pooled");
        assert_eq!(registry.mutation("positional").unwrap().name(), "positional");
    }

    #[test]
    fn unknown_names_list_alternatives() {
        let registry = OperatorRegistry::with_defaults();
        match registry.crossover("uniform") {
            Err(QrError::Config(ConfigError::UnknownOperator { kind, name, known })) => {
                assert_eq!(kind, "crossover");
                assert_eq!(name, "uniform");
                assert_eq!(known, "pooled, positional");
            }
            Err(other) => panic!("expected unknown operator, got {other:?}"),
            Ok(_) => panic!("expected unknown operator"),
        }
    }

    #[test]
    fn target_objective_needs_a_value() {
        let registry: OperatorRegistry<SlotKey> = OperatorRegistry::new();
        let missing = ObjectiveConfig {
            name: "target".to_string(),
            target: None,
        };
        assert!(registry.objective(&missing).is_err());

        let config = ObjectiveConfig {
            name: "target".to_string(),
            target: Some(1.5),
        };
        let objective = registry.objective(&config).unwrap();
        let entry = Entry::new(SlotKey::new(vec![1])).with_measured(1.0);
        assert_eq!(objective.evaluate(&entry, true).unwrap(), 0.5);
    }

    #[test]
    fn custom_operators_can_be_registered() {
        let mut registry: OperatorRegistry<SlotKey> = OperatorRegistry::new();
        assert!(registry.mutation("pooled").is_err());
        registry.register_mutation("pooled", || Box::new(PooledMutation::default()));
        assert!(registry.mutation("pooled").is_ok());
    }
}
