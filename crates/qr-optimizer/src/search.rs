//! Candidate-generation strategies and the context they run in.

use qr_types::{EntryCollection, EntryKey, GenerationHistory, QrResult};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ranker::EntryRanker;

/// Everything a strategy may read while building generation `iteration`.
///
/// Only completed generations are visible: `history` holds generations
/// `0..iteration` and `full_dataset` is their union.
pub struct SearchContext<'a, K: EntryKey> {
    /// Index of the generation being built.
    pub iteration: usize,
    pub history: &'a GenerationHistory<K>,
    pub full_dataset: &'a EntryCollection<K>,
    pub search_space: Option<&'a EntryCollection<K>>,
    pub ranker: &'a EntryRanker<K>,
    pub entries_per_generation: usize,
    pub rng: &'a mut ChaCha8Rng,
}

/// Common trait for candidate-generation strategies.
pub trait SearchStrategy<K: EntryKey>: Send {
    /// Derive strategy state from the reference collection (the search space
    /// when one is set, otherwise the initial data). Re-run whenever either
    /// changes.
    fn configure(&mut self, reference: &EntryCollection<K>) -> QrResult<()>;

    /// Fail fast if a required sub-component is missing or incompatible with
    /// the seed data.
    fn check_components(
        &self,
        initial: &EntryCollection<K>,
        search_space: Option<&EntryCollection<K>>,
    ) -> QrResult<()>;

    /// Propose up to `ctx.entries_per_generation` new, never-evaluated
    /// candidates.
    fn new_candidates(&mut self, ctx: SearchContext<'_, K>) -> QrResult<CandidateBatch<K>>;

    fn name(&self) -> &str;
}

/// A proposed generation. A batch smaller than `requested` is valid output;
/// `exhausted` says the strategy ran out of attempts or candidates.
#[derive(Debug, Clone)]
pub struct CandidateBatch<K: EntryKey> {
    pub entries: EntryCollection<K>,
    pub requested: usize,
    pub attempts_used: u64,
    pub exhausted: bool,
}

impl<K: EntryKey> CandidateBatch<K> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fewer entries than requested.
    pub fn is_short(&self) -> bool {
        self.entries.len() < self.requested
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            requested: self.requested,
            produced: self.entries.len(),
            attempts_used: self.attempts_used,
            exhausted: self.exhausted,
        }
    }

    pub fn into_entries(self) -> EntryCollection<K> {
        self.entries
    }
}

/// Size and effort of a proposed batch, without the entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub produced: usize,
    pub attempts_used: u64,
    pub exhausted: bool,
}
