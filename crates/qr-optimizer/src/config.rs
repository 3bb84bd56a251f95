//! Search configuration: the values a host CLI or config file would set.

use qr_types::{ConfigError, QrResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

/// Which objective function ranks entries, by registry name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveConfig {
    /// Registry name, e.g. "simple" or "target".
    pub name: String,
    /// Target value for the "target" objective.
    #[serde(default)]
    pub target: Option<f64>,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            name: "simple".to_string(),
            target: None,
        }
    }
}

/// Settings for the genetic strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    /// Registry name of the crossover function.
    pub crossover: String,
    /// Registry name of the mutation function.
    pub mutation: String,
    /// The best pool member is this many times as likely to be drawn as the
    /// worst.
    pub ranking_weight: f64,
    /// Probability that a child is mutated after crossover.
    pub mutation_probability: f64,
    /// Best-so-far entries always added to the breeding pool.
    pub number_elite: usize,
    /// How many recent generations form the breeding pool.
    pub previous_iterations: usize,
    /// Attempt budget multiplier: `entries_per_generation * attempts_per_entry`.
    pub attempts_per_entry: u64,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            crossover: "positional".to_string(),
            mutation: "positional".to_string(),
            ranking_weight: 10.0,
            mutation_probability: 0.1,
            number_elite: 0,
            previous_iterations: 1,
            attempts_per_entry: 10_000,
        }
    }
}

impl GeneticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ranking_weight(self.ranking_weight)?;
        validate_unit_interval("mutation_probability", self.mutation_probability)?;
        if self.attempts_per_entry == 0 {
            return Err(ConfigError::out_of_range(
                "attempts_per_entry",
                self.attempts_per_entry,
                "> 0",
            ));
        }
        Ok(())
    }
}

/// Settings for the surrogate ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Number of member models.
    pub members: usize,
    /// Fraction of the training set each member sees. With deterministic
    /// members such as `NearestNeighborModel`, the subsamples are the only
    /// source of disagreement: `1.0` gives every member the same data and the
    /// ensemble variance is zero everywhere.
    pub subsample_fraction: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            members: 10,
            subsample_fraction: 0.8,
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.members == 0 {
            return Err(ConfigError::EmptyEnsemble);
        }
        if !(self.subsample_fraction > 0.0 && self.subsample_fraction <= 1.0) {
            return Err(ConfigError::out_of_range(
                "subsample_fraction",
                self.subsample_fraction,
                "(0, 1]",
            ));
        }
        Ok(())
    }
}

/// Settings for the active-learning strategy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveLearningConfig {
    /// Fraction of each generation drawn uniformly at random.
    pub random_fraction: f64,
    /// Fraction of each generation taken from the least-trusted predictions.
    pub worst_fraction: f64,
    pub ensemble: EnsembleConfig,
}

impl ActiveLearningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_unit_interval("random_fraction", self.random_fraction)?;
        validate_unit_interval("worst_fraction", self.worst_fraction)?;
        self.ensemble.validate()
    }
}

/// Candidate-generation strategy and its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Genetic(GeneticConfig),
    ActiveLearning(ActiveLearningConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Genetic(GeneticConfig::default())
    }
}

impl StrategyConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Genetic(_) => "genetic",
            Self::ActiveLearning(_) => "active_learning",
        }
    }
}

/// Top-level configuration for a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Candidates requested per generation.
    #[serde(default = "default_entries_per_generation")]
    pub entries_per_generation: usize,

    /// Seed for the engine RNG; `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub direction: ObjectiveDirection,

    #[serde(default)]
    pub objective: ObjectiveConfig,

    #[serde(default)]
    pub strategy: StrategyConfig,
}

fn default_name() -> String {
    "search".to_string()
}

fn default_entries_per_generation() -> usize {
    100
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            entries_per_generation: default_entries_per_generation(),
            seed: None,
            direction: ObjectiveDirection::Maximize,
            objective: ObjectiveConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn new(name: impl Into<String>, strategy: StrategyConfig) -> Self {
        Self {
            name: name.into(),
            strategy,
            ..Self::default()
        }
    }

    pub fn with_entries_per_generation(mut self, n: usize) -> Self {
        self.entries_per_generation = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_objective(mut self, name: &str, target: Option<f64>) -> Self {
        self.objective = ObjectiveConfig {
            name: name.to_string(),
            target,
        };
        self
    }

    /// Check every range constraint, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries_per_generation == 0 {
            return Err(ConfigError::out_of_range(
                "entries_per_generation",
                self.entries_per_generation,
                "> 0",
            ));
        }
        match &self.strategy {
            StrategyConfig::Genetic(genetic) => genetic.validate(),
            StrategyConfig::ActiveLearning(active) => active.validate(),
        }
    }

    pub fn from_json_str(json: &str) -> QrResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> QrResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> QrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn validate_unit_interval(parameter: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(parameter, value, "[0, 1]"))
    }
}

pub(crate) fn validate_ranking_weight(value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range("ranking_weight", value, ">= 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = SearchConfig::default();
        assert_eq!(config.entries_per_generation, 100);
        assert_eq!(config.direction, ObjectiveDirection::Maximize);
        match config.strategy {
            StrategyConfig::Genetic(g) => {
                assert_eq!(g.ranking_weight, 10.0);
                assert_eq!(g.mutation_probability, 0.1);
                assert_eq!(g.attempts_per_entry, 10_000);
                assert_eq!(g.previous_iterations, 1);
                assert_eq!(g.number_elite, 0);
            }
            other => panic!("unexpected default strategy: {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        let config = SearchConfig::default().with_entries_per_generation(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { parameter, .. }) if parameter == "entries_per_generation"
        ));

        let genetic = GeneticConfig {
            ranking_weight: 0.5,
            ..GeneticConfig::default()
        };
        let err = genetic.validate().unwrap_err();
        assert!(err.to_string().contains(">= 1"));

        let active = ActiveLearningConfig {
            random_fraction: 1.2,
            ..ActiveLearningConfig::default()
        };
        assert!(active.validate().is_err());

        let empty = ActiveLearningConfig {
            ensemble: EnsembleConfig {
                members: 0,
                subsample_fraction: 0.8,
            },
            ..ActiveLearningConfig::default()
        };
        assert_eq!(empty.validate(), Err(ConfigError::EmptyEnsemble));
    }

    #[test]
    fn parses_tagged_strategy() {
        let json = r#"{
            "name": "heusler",
            "entries_per_generation": 20,
            "seed": 7,
            "direction": "minimize",
            "objective": {"name": "target", "target": 0.0},
            "strategy": {"type": "active_learning", "random_fraction": 0.2, "worst_fraction": 0.1}
        }"#;
        let config = SearchConfig::from_json_str(json).unwrap();
        assert_eq!(config.entries_per_generation, 20);
        assert_eq!(config.direction, ObjectiveDirection::Minimize);
        assert_eq!(config.objective.target, Some(0.0));
        match config.strategy {
            StrategyConfig::ActiveLearning(a) => {
                assert_eq!(a.random_fraction, 0.2);
                assert_eq!(a.ensemble.members, 10);
            }
            other => panic!("unexpected strategy: {other:?}"),
        }
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        let json = r#"{"strategy": {"type": "genetic", "mutation_probability": 2.0}}"#;
        assert!(SearchConfig::from_json_str(json).is_err());
    }

    #[test]
    fn loads_from_file() {
        let config = SearchConfig::new("file_test", StrategyConfig::default())
            .with_entries_per_generation(8)
            .with_seed(3);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_pretty().unwrap().as_bytes())
            .unwrap();

        let loaded = SearchConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
