//! Mutation functions for slot identities.
//!
//! Each slot of a `K`-slot identity is redrawn with probability `1/K`. A
//! redraw that collides with another slot is retried up to the retry budget;
//! if the budget runs out the slot keeps its old value.

use qr_types::{ConfigError, Entry, EntryCollection, QrResult, SlotKey};
use rand::{seq::SliceRandom, Rng, RngCore};
use std::collections::BTreeSet;

use super::{MutationFunction, DEFAULT_SLOT_RETRIES};

/// Slot count shared by every identity in the search space.
fn uniform_slot_count(search_space: &EntryCollection<SlotKey>) -> QrResult<usize> {
    let mut keys = search_space.keys();
    let first = keys.next().ok_or_else(|| ConfigError::Invalid {
        message: "cannot configure mutation from an empty search space".to_string(),
    })?;
    let n = first.len();
    if let Some(other) = keys.find(|k| k.len() != n) {
        return Err(ConfigError::ShapeMismatch {
            message: format!(
                "search space mixes {n}-slot and {}-slot identities ({first} vs {other})",
                other.len()
            ),
        }
        .into());
    }
    Ok(n)
}

/// Redraw slots of `entry` using `universe_for(i)` as the pool for slot `i`.
fn mutate_slots<'u>(
    entry: &mut Entry<SlotKey>,
    rng: &mut dyn RngCore,
    max_retries: usize,
    universe_for: impl Fn(usize) -> &'u [u32],
) -> bool {
    let n = entry.key.len();
    if n == 0 {
        return false;
    }
    let p = 1.0 / n as f64;
    let mut slots = entry.key.slots().to_vec();
    let mut changed = false;

    for i in 0..n {
        if !rng.gen_bool(p) {
            continue;
        }
        let universe = universe_for(i);
        for _ in 0..max_retries {
            let Some(&candidate) = universe.choose(&mut *rng) else {
                break;
            };
            let collides = slots
                .iter()
                .enumerate()
                .any(|(j, v)| j != i && *v == candidate);
            if !collides {
                if candidate != slots[i] {
                    slots[i] = candidate;
                    changed = true;
                }
                break;
            }
        }
    }

    if changed {
        entry.key = SlotKey::new(slots);
        entry.attributes = None;
        entry.clear_values();
    }
    changed
}

/// Every slot draws from the union of all values seen in the search space.
#[derive(Debug, Clone)]
pub struct PooledMutation {
    pub max_retries: usize,
    universe: Vec<u32>,
    slot_count: Option<usize>,
}

impl Default for PooledMutation {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_SLOT_RETRIES,
            universe: Vec::new(),
            slot_count: None,
        }
    }
}

impl PooledMutation {
    pub fn universe(&self) -> &[u32] {
        &self.universe
    }
}

impl MutationFunction<SlotKey> for PooledMutation {
    fn configure(&mut self, search_space: &EntryCollection<SlotKey>) -> QrResult<()> {
        let n = uniform_slot_count(search_space)?;
        let values: BTreeSet<u32> = search_space
            .keys()
            .flat_map(|k| k.slots().iter().copied())
            .collect();
        self.universe = values.into_iter().collect();
        self.slot_count = Some(n);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.slot_count.is_some()
    }

    fn accepts(&self, entry: &Entry<SlotKey>) -> bool {
        self.slot_count == Some(entry.key.len())
    }

    fn mutate(&self, entry: &mut Entry<SlotKey>, rng: &mut dyn RngCore) -> bool {
        if !self.accepts(entry) {
            return false;
        }
        mutate_slots(entry, rng, self.max_retries, |_| self.universe.as_slice())
    }

    fn name(&self) -> &str {
        "pooled"
    }
}

/// Slot `i` draws only from values seen at position `i` in the search space.
#[derive(Debug, Clone)]
pub struct PositionalMutation {
    pub max_retries: usize,
    universes: Vec<Vec<u32>>,
}

impl Default for PositionalMutation {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_SLOT_RETRIES,
            universes: Vec::new(),
        }
    }
}

impl PositionalMutation {
    /// Values legal at slot `position`.
    pub fn universe(&self, position: usize) -> Option<&[u32]> {
        self.universes.get(position).map(Vec::as_slice)
    }
}

impl MutationFunction<SlotKey> for PositionalMutation {
    fn configure(&mut self, search_space: &EntryCollection<SlotKey>) -> QrResult<()> {
        let n = uniform_slot_count(search_space)?;
        let mut per_slot = vec![BTreeSet::new(); n];
        for key in search_space.keys() {
            for (set, value) in per_slot.iter_mut().zip(key.slots()) {
                set.insert(*value);
            }
        }
        self.universes = per_slot
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect();
        Ok(())
    }

    fn is_configured(&self) -> bool {
        !self.universes.is_empty()
    }

    fn accepts(&self, entry: &Entry<SlotKey>) -> bool {
        self.is_configured() && self.universes.len() == entry.key.len()
    }

    fn mutate(&self, entry: &mut Entry<SlotKey>, rng: &mut dyn RngCore) -> bool {
        if !self.accepts(entry) {
            return false;
        }
        mutate_slots(entry, rng, self.max_retries, |i| self.universes[i].as_slice())
    }

    fn name(&self) -> &str {
        "positional"
    }
}
