//! The search engine: owns the generation history and drives one strategy
//! through propose → evaluate → record cycles.

use chrono::{DateTime, Utc};
use qr_types::{
    ConfigError, Entry, EntryCollection, EntryKey, GenerationHistory, OracleError, QrResult,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::active::ActiveLearningSearch;
use crate::config::{SearchConfig, StrategyConfig};
use crate::ensemble::ModelFactory;
use crate::genetic::GeneticSearch;
use crate::operators::OperatorRegistry;
use crate::oracle::Oracle;
use crate::ranker::EntryRanker;
use crate::search::{CandidateBatch, SearchContext, SearchStrategy};
use crate::statistics::{OptimizationStatistics, DEFAULT_TOP_ENTRIES};

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Lifecycle of a search run. There is no terminal state; the caller stops
/// issuing steps when it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    /// No initial data yet.
    Idle,
    /// Ready to propose the next generation.
    Ready,
    /// A batch is with the oracle.
    AwaitingEvaluation,
}

/// Bookkeeping for one proposed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub index: usize,
    pub requested: usize,
    pub produced: usize,
    pub attempts_used: u64,
    pub exhausted: bool,
    pub proposed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct SearchEngine<K: EntryKey> {
    id: SearchId,
    name: String,
    entries_per_generation: usize,
    rng: ChaCha8Rng,
    state: SearchState,
    strategy: Box<dyn SearchStrategy<K>>,
    history: Option<GenerationHistory<K>>,
    search_space: Option<EntryCollection<K>>,
    ranker: Option<EntryRanker<K>>,
    oracle: Option<Oracle<K>>,
    proposal: Option<GenerationRecord>,
    records: Vec<GenerationRecord>,
}

impl<K: EntryKey> SearchEngine<K> {
    /// Engine with an entropy-seeded RNG. Call [`with_seed`](Self::with_seed)
    /// for reproducible runs.
    pub fn new(
        strategy: Box<dyn SearchStrategy<K>>,
        entries_per_generation: usize,
    ) -> QrResult<Self> {
        validate_entries_per_generation(entries_per_generation)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: "search".to_string(),
            entries_per_generation,
            rng: ChaCha8Rng::from_entropy(),
            state: SearchState::Idle,
            strategy,
            history: None,
            search_space: None,
            ranker: None,
            oracle: None,
            proposal: None,
            records: Vec::new(),
        })
    }

    /// Build the strategy and ranker named in `config`. Active learning
    /// needs `model_factory` for its ensemble members.
    pub fn from_config(
        config: &SearchConfig,
        registry: &OperatorRegistry<K>,
        model_factory: Option<ModelFactory<K>>,
    ) -> QrResult<Self> {
        config.validate()?;
        let strategy: Box<dyn SearchStrategy<K>> = match &config.strategy {
            StrategyConfig::Genetic(genetic) => {
                Box::new(GeneticSearch::from_registry(genetic.clone(), registry)?)
            }
            StrategyConfig::ActiveLearning(active) => {
                let factory =
                    model_factory.ok_or_else(|| ConfigError::missing("surrogate model"))?;
                Box::new(ActiveLearningSearch::new(active.clone(), factory)?)
            }
        };

        let mut engine = Self::new(strategy, config.entries_per_generation)?;
        engine.name = config.name.clone();
        engine.ranker = Some(registry.ranker(config)?);
        if let Some(seed) = config.seed {
            engine.rng = ChaCha8Rng::seed_from_u64(seed);
        }
        info!(
            "Created {} search {} ({})",
            engine.strategy.name(),
            engine.name,
            engine.id
        );
        Ok(engine)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id(&self) -> SearchId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn entries_per_generation(&self) -> usize {
        self.entries_per_generation
    }

    // ---- Settings ----

    fn ensure_unlocked(&self, setting: &str) -> QrResult<()> {
        if self.state == SearchState::AwaitingEvaluation {
            return Err(ConfigError::Locked {
                message: format!("cannot change {setting} while a batch is awaiting evaluation"),
            }
            .into());
        }
        Ok(())
    }

    /// Seed the run with generation 0. Every entry must be measured, and the
    /// seed cannot change once a generation has been recorded.
    pub fn set_initial_data(&mut self, data: EntryCollection<K>) -> QrResult<()> {
        self.ensure_unlocked("initial data")?;
        if !self.records.is_empty() {
            return Err(ConfigError::Locked {
                message: "initial data cannot change after the first generation".to_string(),
            }
            .into());
        }
        if data.is_empty() {
            return Err(ConfigError::Invalid {
                message: "initial data is empty".to_string(),
            }
            .into());
        }
        if let Some(entry) = data.iter().find(|e| !e.has_measurement()) {
            return Err(ConfigError::Invalid {
                message: format!("initial entry {} has no measured value", entry.key),
            }
            .into());
        }

        // The search space, when set, stays the strategy's reference
        if self.search_space.is_none() {
            self.strategy.configure(&data)?;
        }

        debug!("Initial data: {} entries", data.len());
        self.history = Some(GenerationHistory::new(data));
        self.state = SearchState::Ready;
        Ok(())
    }

    pub fn set_search_space(&mut self, space: EntryCollection<K>) -> QrResult<()> {
        self.ensure_unlocked("the search space")?;
        self.strategy.configure(&space)?;
        debug!("Search space: {} entries", space.len());
        self.search_space = Some(space);
        Ok(())
    }

    pub fn search_space(&self) -> Option<&EntryCollection<K>> {
        self.search_space.as_ref()
    }

    pub fn set_oracle(&mut self, oracle: Oracle<K>) -> QrResult<()> {
        self.ensure_unlocked("the oracle")?;
        self.oracle = Some(oracle);
        Ok(())
    }

    pub fn oracle(&self) -> Option<&Oracle<K>> {
        self.oracle.as_ref()
    }

    pub fn set_ranker(&mut self, ranker: EntryRanker<K>) -> QrResult<()> {
        self.ensure_unlocked("the ranker")?;
        self.ranker = Some(ranker);
        Ok(())
    }

    pub fn ranker(&self) -> Option<&EntryRanker<K>> {
        self.ranker.as_ref()
    }

    pub fn set_entries_per_generation(&mut self, n: usize) -> QrResult<()> {
        self.ensure_unlocked("entries_per_generation")?;
        validate_entries_per_generation(n)?;
        self.entries_per_generation = n;
        Ok(())
    }

    /// Fail fast if anything a generation needs is unset.
    pub fn check_components(&self) -> QrResult<()> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| ConfigError::missing("initial data"))?;
        if self.ranker.is_none() {
            return Err(ConfigError::missing("ranker").into());
        }
        if self.oracle.is_none() {
            return Err(ConfigError::missing("oracle").into());
        }
        self.strategy
            .check_components(history.initial(), self.search_space.as_ref())
    }

    // ---- Generation cycle ----

    /// Propose the next generation from everything evaluated so far. The
    /// batch must go through [`submit`](Self::submit) and
    /// [`evaluate_pending`](Self::evaluate_pending) (or be measured by the
    /// caller and passed to [`record_generation`](Self::record_generation))
    /// before the next step.
    pub fn step(&mut self) -> QrResult<CandidateBatch<K>> {
        if self.state == SearchState::AwaitingEvaluation {
            return Err(OracleError::misuse("previous generation has not been recorded").into());
        }
        self.check_components()?;
        let (Some(history), Some(ranker)) = (self.history.as_ref(), self.ranker.as_ref()) else {
            return Err(ConfigError::missing("initial data").into());
        };

        let iteration = history.len();
        let full_dataset = history.all();
        let proposed_at = Utc::now();
        let batch = self.strategy.new_candidates(SearchContext {
            iteration,
            history,
            full_dataset: &full_dataset,
            search_space: self.search_space.as_ref(),
            ranker,
            entries_per_generation: self.entries_per_generation,
            rng: &mut self.rng,
        })?;

        if batch.is_short() {
            warn!(
                "Generation {} is short: {} of {} requested entries",
                iteration,
                batch.len(),
                batch.requested
            );
        }
        debug!(
            "Proposed generation {} with {} entries in {} attempts",
            iteration,
            batch.len(),
            batch.attempts_used
        );

        self.proposal = Some(GenerationRecord {
            index: iteration,
            requested: batch.requested,
            produced: batch.len(),
            attempts_used: batch.attempts_used,
            exhausted: batch.exhausted,
            proposed_at,
            completed_at: None,
        });
        Ok(batch)
    }

    /// Hand a proposed batch to the oracle.
    pub fn submit(&mut self, batch: CandidateBatch<K>) -> QrResult<()> {
        if self.state != SearchState::Ready {
            return Err(OracleError::misuse(format!(
                "cannot submit a batch in state {:?}",
                self.state
            ))
            .into());
        }
        let oracle = self
            .oracle
            .as_mut()
            .ok_or_else(|| ConfigError::missing("oracle"))?;
        oracle.submit(batch.into_entries())?;
        self.state = SearchState::AwaitingEvaluation;
        Ok(())
    }

    /// Block on the oracle, then record the measured batch as the next
    /// generation. Returns the new generation index.
    pub fn evaluate_pending(&mut self) -> QrResult<usize> {
        if self.state != SearchState::AwaitingEvaluation {
            return Err(OracleError::misuse("no batch is awaiting evaluation").into());
        }
        let oracle = self
            .oracle
            .as_mut()
            .ok_or_else(|| ConfigError::missing("oracle"))?;
        oracle.evaluate()?;
        let evaluated = oracle.retrieve()?;
        self.state = SearchState::Ready;
        self.record_generation(evaluated)
    }

    /// Append a fully measured batch to the history. Returns its generation
    /// index.
    pub fn record_generation(&mut self, evaluated: EntryCollection<K>) -> QrResult<usize> {
        if self.state == SearchState::AwaitingEvaluation
            || self.oracle.as_ref().is_some_and(Oracle::has_pending)
        {
            return Err(
                OracleError::misuse("retrieve the outstanding batch before recording it").into(),
            );
        }
        let missing = evaluated.iter().filter(|e| !e.has_measurement()).count();
        if missing > 0 {
            return Err(OracleError::Incomplete {
                missing,
                total: evaluated.len(),
            }
            .into());
        }
        let history = self
            .history
            .as_mut()
            .ok_or_else(|| ConfigError::missing("initial data"))?;

        let produced = evaluated.len();
        let index = history.push(evaluated);
        let now = Utc::now();
        let mut record = self.proposal.take().unwrap_or_else(|| GenerationRecord {
            index,
            requested: produced,
            produced,
            attempts_used: 0,
            exhausted: false,
            proposed_at: now,
            completed_at: None,
        });
        record.index = index;
        record.produced = produced;
        record.completed_at = Some(now);
        self.records.push(record);

        info!(
            "Search {}: recorded generation {} ({} entries)",
            self.name, index, produced
        );
        Ok(index)
    }

    /// Propose, evaluate and record one generation.
    pub fn run_generation(&mut self) -> QrResult<GenerationRecord> {
        let batch = self.step()?;
        self.submit(batch)?;
        let index = self.evaluate_pending()?;
        self.records
            .last()
            .filter(|record| record.index == index)
            .cloned()
            .ok_or_else(|| qr_types::internal_error!("generation {index} was not recorded"))
    }

    /// Run `generations` full cycles.
    pub fn run(&mut self, generations: usize) -> QrResult<Vec<GenerationRecord>> {
        self.check_components()?;
        info!(
            "Search {}: running {} generations with {} strategy",
            self.name,
            generations,
            self.strategy.name()
        );
        (0..generations).map(|_| self.run_generation()).collect()
    }

    // ---- Results ----

    /// Number of generations evaluated after the initial data.
    pub fn current_iteration(&self) -> usize {
        self.history.as_ref().map_or(0, |h| h.len() - 1)
    }

    pub fn history(&self) -> Option<&GenerationHistory<K>> {
        self.history.as_ref()
    }

    /// Entries evaluated in generation `g`; generation 0 is the initial data.
    pub fn generation(&self, g: usize) -> Option<&EntryCollection<K>> {
        self.history.as_ref()?.generation(g)
    }

    /// Union of generations `0..g`: everything evaluated before generation
    /// `g` was built.
    pub fn full_dataset(&self, g: usize) -> QrResult<EntryCollection<K>> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| ConfigError::missing("initial data"))?;
        if g > history.len() {
            return Err(qr_types::validation_error!(
                "generation {} is beyond the next generation {}",
                g,
                history.len()
            ));
        }
        Ok(history.full_dataset(g))
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    /// Best measured entry evaluated so far.
    pub fn best_entry(&self) -> QrResult<Option<Entry<K>>> {
        let (Some(history), Some(ranker)) = (self.history.as_ref(), self.ranker.as_ref()) else {
            return Ok(None);
        };
        let all = history.all();
        let ranked = ranker.rank(&all, true)?;
        Ok(ranked.first().map(|&i| all.entries()[i].clone()))
    }

    /// Per-generation statistics, tracking the default number of top
    /// entries.
    pub fn statistics(&self) -> QrResult<OptimizationStatistics> {
        self.statistics_with_top(DEFAULT_TOP_ENTRIES)
    }

    pub fn statistics_with_top(
        &self,
        number_top_entries: usize,
    ) -> QrResult<OptimizationStatistics> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| ConfigError::missing("initial data"))?;
        let ranker = self
            .ranker
            .as_ref()
            .ok_or_else(|| ConfigError::missing("ranker"))?;
        OptimizationStatistics::evaluate(
            history,
            ranker,
            self.search_space.as_ref(),
            number_top_entries,
        )
    }
}

fn validate_entries_per_generation(n: usize) -> Result<(), ConfigError> {
    if n == 0 {
        return Err(ConfigError::out_of_range("entries_per_generation", n, "> 0"));
    }
    Ok(())
}

impl<K: EntryKey> std::fmt::Debug for SearchEngine<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .field("iteration", &self.current_iteration())
            .field("entries_per_generation", &self.entries_per_generation)
            .finish()
    }
}
