//! Genetic candidate generation: rank-weighted parent selection, crossover,
//! optional mutation, and bounded rejection sampling of the offspring.

use qr_types::{ConfigError, EntryCollection, EntryKey, QrResult};
use rand::{Rng, RngCore};
use tracing::{debug, warn};

use crate::config::GeneticConfig;
use crate::operators::{CrossoverFunction, MutationFunction, OperatorRegistry};
use crate::search::{CandidateBatch, SearchContext, SearchStrategy};

/// Cumulative selection weights for a pool ranked best→worst.
///
/// `w[0] = 1` and `w[i] = w[i-1] + exp(-i * ln(ranking_weight) / (n - 1))`,
/// so the best member is `ranking_weight` times as likely to be drawn as the
/// worst. A single-member pool gets `[1.0]`; an empty pool gets nothing.
pub fn cumulative_weights(pool_size: usize, ranking_weight: f64) -> Vec<f64> {
    match pool_size {
        0 => Vec::new(),
        1 => vec![1.0],
        n => {
            let decay = ranking_weight.ln() / (n - 1) as f64;
            let mut weights = Vec::with_capacity(n);
            let mut total = 1.0;
            weights.push(total);
            for i in 1..n {
                total += (-decay * i as f64).exp();
                weights.push(total);
            }
            weights
        }
    }
}

/// Inverse-CDF draw: the smallest index whose cumulative weight reaches a
/// uniform draw on `[0, total)`.
pub fn select_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let Some(total) = weights.last() else {
        return 0;
    };
    let u = rng.gen::<f64>() * total;
    weights
        .partition_point(|w| *w < u)
        .min(weights.len() - 1)
}

/// Inverse-CDF draw with `exclude` removed from the distribution. Falls back
/// to a uniform pick among the other members when their combined weight
/// vanishes next to the excluded one. A single-member pool returns 0.
pub fn select_other_index<R: Rng + ?Sized>(weights: &[f64], exclude: usize, rng: &mut R) -> usize {
    let n = weights.len();
    if n <= 1 || exclude >= n {
        return select_index(weights, rng);
    }
    let start = if exclude == 0 { 0.0 } else { weights[exclude - 1] };
    let excluded = weights[exclude] - start;
    let remaining = weights[n - 1] - excluded;

    let i = if remaining > 0.0 {
        let u = rng.gen::<f64>() * remaining;
        let target = if u < start { u } else { u + excluded };
        weights.partition_point(|w| *w < target).min(n - 1)
    } else {
        let i = rng.gen_range(0..n - 1);
        if i >= exclude {
            i + 1
        } else {
            i
        }
    };

    match i {
        i if i != exclude => i,
        _ if exclude + 1 < n => exclude + 1,
        _ => exclude - 1,
    }
}

pub struct GeneticSearch<K: EntryKey> {
    config: GeneticConfig,
    crossover: Box<dyn CrossoverFunction<K>>,
    mutation: Box<dyn MutationFunction<K>>,
    last_pool: Option<EntryCollection<K>>,
}

impl<K: EntryKey> GeneticSearch<K> {
    pub fn new(
        config: GeneticConfig,
        crossover: Box<dyn CrossoverFunction<K>>,
        mutation: Box<dyn MutationFunction<K>>,
    ) -> QrResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            crossover,
            mutation,
            last_pool: None,
        })
    }

    /// Build with the operators named in `config`.
    pub fn from_registry(config: GeneticConfig, registry: &OperatorRegistry<K>) -> QrResult<Self> {
        let crossover = registry.crossover(&config.crossover)?;
        let mutation = registry.mutation(&config.mutation)?;
        Self::new(config, crossover, mutation)
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// The breeding pool used for the most recent generation.
    pub fn last_pool(&self) -> Option<&EntryCollection<K>> {
        self.last_pool.as_ref()
    }

    /// Parents eligible for the generation described by `ctx`.
    ///
    /// Before any generation has been evaluated the pool is the seed data.
    /// Afterwards it is the union of the last `previous_iterations`
    /// generations plus the `number_elite` best entries evaluated so far.
    pub fn breeding_pool(&self, ctx: &SearchContext<'_, K>) -> QrResult<EntryCollection<K>> {
        let history = ctx.history;
        if history.len() <= 1 {
            return Ok(history.initial().clone());
        }

        let to = history.len();
        let from = to.saturating_sub(self.config.previous_iterations);
        let mut pool = history.window(from, to);

        if self.config.number_elite > 0 {
            let ranked = ctx.ranker.rank(ctx.full_dataset, true)?;
            for &i in ranked.iter().take(self.config.number_elite) {
                pool.add_entry(ctx.full_dataset.entries()[i].clone());
            }
        }
        Ok(pool)
    }
}

impl<K: EntryKey> SearchStrategy<K> for GeneticSearch<K> {
    fn configure(&mut self, reference: &EntryCollection<K>) -> QrResult<()> {
        self.mutation.configure(reference)
    }

    fn check_components(
        &self,
        initial: &EntryCollection<K>,
        _: Option<&EntryCollection<K>>,
    ) -> QrResult<()> {
        if !self.mutation.is_configured() {
            return Err(ConfigError::missing(format!(
                "configuration of the {} mutation",
                self.mutation.name()
            ))
            .into());
        }
        if let Some(entry) = initial.iter().find(|e| !self.mutation.accepts(e)) {
            return Err(ConfigError::ShapeMismatch {
                message: format!(
                    "seed entry {} does not fit the {} mutation",
                    entry.key,
                    self.mutation.name()
                ),
            }
            .into());
        }
        Ok(())
    }

    fn new_candidates(&mut self, ctx: SearchContext<'_, K>) -> QrResult<CandidateBatch<K>> {
        let pool = self.breeding_pool(&ctx)?;
        let requested = ctx.entries_per_generation;
        let mut output = ctx.full_dataset.empty_clone();

        if pool.is_empty() {
            warn!(
                "Breeding pool for generation {} is empty; no candidates produced",
                ctx.iteration
            );
            self.last_pool = Some(pool);
            return Ok(CandidateBatch {
                entries: output,
                requested,
                attempts_used: 0,
                exhausted: true,
            });
        }

        let rank = ctx.ranker.rank(&pool, true)?;
        let weights = cumulative_weights(pool.len(), self.config.ranking_weight);
        let budget = (requested as u64).saturating_mul(self.config.attempts_per_entry);
        debug!(
            "Generation {}: pool of {} parents, attempt budget {}",
            ctx.iteration,
            pool.len(),
            budget
        );

        let rng: &mut dyn RngCore = ctx.rng;
        let mut attempts = 0u64;
        let mut exhausted = false;
        while output.len() < requested {
            if attempts >= budget {
                exhausted = true;
                break;
            }
            attempts += 1;

            let first = select_index(&weights, rng);
            let second = select_other_index(&weights, first, rng);
            let a = &pool.entries()[rank[first]];
            let b = &pool.entries()[rank[second]];

            let Some(mut child) = self.crossover.crossover(a, b, rng) else {
                continue;
            };
            if rng.gen::<f64>() < self.config.mutation_probability {
                self.mutation.mutate(&mut child, rng);
            }

            if output.contains_key(&child.key) || ctx.full_dataset.contains_key(&child.key) {
                continue;
            }
            if let Some(space) = ctx.search_space {
                match space.get_by_key(&child.key) {
                    Some(known) => child.attributes = known.attributes.clone(),
                    None => continue,
                }
            }
            child.clear_values();
            output.add_entry(child);
        }

        if exhausted {
            warn!(
                "Ran out of attempts for generation {}: produced {} of {} entries after {} attempts",
                ctx.iteration,
                output.len(),
                requested,
                attempts
            );
        }

        self.last_pool = Some(pool);
        Ok(CandidateBatch {
            entries: output,
            requested,
            attempts_used: attempts,
            exhausted,
        })
    }

    fn name(&self) -> &str {
        "genetic"
    }
}

impl<K: EntryKey> std::fmt::Debug for GeneticSearch<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneticSearch")
            .field("config", &self.config)
            .field("crossover", &self.crossover.name())
            .field("mutation", &self.mutation.name())
            .finish()
    }
}
