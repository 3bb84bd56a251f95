//! Active-learning candidate selection.
//!
//! Each generation blends three sources, in this order:
//!
//! 1. uniform random picks from the unevaluated search space (exploration),
//! 2. the entries the surrogate ensemble disagrees on most (uncertainty),
//! 3. the best entries by ensemble-mean prediction (exploitation).

use qr_types::{ConfigError, EntryCollection, EntryKey, QrResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ActiveLearningConfig;
use crate::ensemble::{ModelFactory, SurrogateEnsemble};
use crate::ranker::rank_indices;
use crate::search::{CandidateBatch, SearchContext, SearchStrategy};

/// How many entries of the last generation came from each source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionBreakdown {
    pub random: usize,
    pub uncertain: usize,
    pub exploit: usize,
}

impl SelectionBreakdown {
    pub fn total(&self) -> usize {
        self.random + self.uncertain + self.exploit
    }
}

pub struct ActiveLearningSearch<K: EntryKey> {
    config: ActiveLearningConfig,
    ensemble: SurrogateEnsemble<K>,
    last_selection: Option<SelectionBreakdown>,
}

impl<K: EntryKey> ActiveLearningSearch<K> {
    pub fn new(config: ActiveLearningConfig, factory: ModelFactory<K>) -> QrResult<Self> {
        config.validate()?;
        let ensemble = SurrogateEnsemble::from_config(&config.ensemble, factory)?;
        Ok(Self {
            config,
            ensemble,
            last_selection: None,
        })
    }

    pub fn config(&self) -> &ActiveLearningConfig {
        &self.config
    }

    pub fn ensemble(&self) -> &SurrogateEnsemble<K> {
        &self.ensemble
    }

    pub fn last_selection(&self) -> Option<SelectionBreakdown> {
        self.last_selection
    }

    fn quota(fraction: f64, entries_per_generation: usize) -> usize {
        (fraction * entries_per_generation as f64).floor() as usize
    }
}

impl<K: EntryKey> SearchStrategy<K> for ActiveLearningSearch<K> {
    fn configure(&mut self, _reference: &EntryCollection<K>) -> QrResult<()> {
        Ok(())
    }

    fn check_components(
        &self,
        _initial: &EntryCollection<K>,
        search_space: Option<&EntryCollection<K>>,
    ) -> QrResult<()> {
        if search_space.is_none() {
            return Err(ConfigError::missing("search space").into());
        }
        if self.ensemble.member_count() == 0 {
            return Err(ConfigError::EmptyEnsemble.into());
        }
        Ok(())
    }

    fn new_candidates(&mut self, ctx: SearchContext<'_, K>) -> QrResult<CandidateBatch<K>> {
        let space = ctx
            .search_space
            .ok_or_else(|| ConfigError::missing("search space"))?;
        let requested = ctx.entries_per_generation;
        let rng = ctx.rng;

        self.ensemble.train(ctx.full_dataset, &mut *rng)?;

        let mut universe = space.without(ctx.full_dataset);
        let universe_size = universe.len();

        let random_quota = Self::quota(self.config.random_fraction, requested);
        let mut output = if random_quota > 0 {
            universe.split_random(random_quota, &mut *rng)
        } else {
            universe.empty_clone()
        };
        let mut breakdown = SelectionBreakdown {
            random: output.len(),
            ..SelectionBreakdown::default()
        };

        if !universe.is_empty() {
            let variance = self.ensemble.annotate(&mut universe)?;

            let worst_quota = Self::quota(self.config.worst_fraction, requested)
                .min(requested.saturating_sub(output.len()));
            for &i in rank_indices(&variance, true).iter().take(worst_quota) {
                if output.add_entry(universe.entries()[i].clone()) {
                    breakdown.uncertain += 1;
                }
            }

            for i in ctx.ranker.rank(&universe, false)? {
                if output.len() >= requested {
                    break;
                }
                if output.add_entry(universe.entries()[i].clone()) {
                    breakdown.exploit += 1;
                }
            }
        }

        let exhausted = output.len() < requested;
        if exhausted {
            warn!(
                "Candidate universe exhausted for generation {}: produced {} of {} entries",
                ctx.iteration,
                output.len(),
                requested
            );
        }
        debug!(
            "Generation {} from {} unevaluated candidates: {} random, {} uncertain, {} exploit",
            ctx.iteration, universe_size, breakdown.random, breakdown.uncertain, breakdown.exploit
        );

        self.last_selection = Some(breakdown);
        Ok(CandidateBatch {
            attempts_used: breakdown.total() as u64,
            entries: output,
            requested,
            exhausted,
        })
    }

    fn name(&self) -> &str {
        "active_learning"
    }
}

impl<K: EntryKey> std::fmt::Debug for ActiveLearningSearch<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveLearningSearch")
            .field("config", &self.config)
            .field("ensemble", &self.ensemble)
            .finish()
    }
}
