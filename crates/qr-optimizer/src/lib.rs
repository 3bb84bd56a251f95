//! # qr-optimizer
//!
//! Generation-based, model-guided combinatorial search for Quarry.
//!
//! A [`SearchEngine`] proposes small batches of never-evaluated candidates,
//! hands them to an [`Oracle`] for ground-truth measurement, and folds the
//! results back into its [`GenerationHistory`](qr_types::GenerationHistory).
//! Two strategies are provided: [`GeneticSearch`] (rank-weighted selection,
//! crossover and mutation with bounded rejection sampling) and
//! [`ActiveLearningSearch`] (random exploration, ensemble-uncertainty
//! exploration and exploitation of a surrogate model).

mod active;
mod config;
mod engine;
mod ensemble;
mod genetic;
mod model;
pub mod operators;
mod oracle;
mod ranker;
mod search;
mod statistics;

pub use active::{ActiveLearningSearch, SelectionBreakdown};
pub use config::{
    ActiveLearningConfig, EnsembleConfig, GeneticConfig, ObjectiveConfig, ObjectiveDirection,
    SearchConfig, StrategyConfig,
};
pub use engine::{GenerationRecord, SearchEngine, SearchId, SearchState};
pub use ensemble::{ModelFactory, SurrogateEnsemble};
pub use genetic::{cumulative_weights, select_index, select_other_index, GeneticSearch};
pub use model::{Model, NearestNeighborModel};
pub use operators::{CrossoverFunction, MutationFunction, OperatorRegistry};
pub use oracle::{ComputeOracle, LookupOracle, Oracle, OracleBackend};
pub use ranker::{
    entry_value, rank_indices, EntryRanker, ObjectiveFunction, SimpleObjective, TargetObjective,
};
pub use search::{BatchSummary, CandidateBatch, SearchContext, SearchStrategy};
pub use statistics::{GenerationStatistics, OptimizationStatistics, DEFAULT_TOP_ENTRIES};
