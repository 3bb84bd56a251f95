//! Crossover functions for slot identities.

use qr_types::{Entry, SlotKey};
use rand::{Rng, RngCore};

use super::{CrossoverFunction, DEFAULT_SLOT_RETRIES};

/// Draw a value with `draw` until it is absent from `taken`, at most
/// `retries` times.
fn draw_unused(
    taken: &[u32],
    retries: usize,
    rng: &mut dyn RngCore,
    draw: impl Fn(&mut dyn RngCore) -> u32,
) -> Option<u32> {
    (0..retries)
        .map(|_| draw(&mut *rng))
        .find(|v| !taken.contains(v))
}

fn same_shape(a: &SlotKey, b: &SlotKey) -> bool {
    !a.is_empty() && a.len() == b.len()
}

/// Every child slot takes a value from any slot of either parent. Slot
/// order carries no meaning (e.g. the elements of a compound).
#[derive(Debug, Clone)]
pub struct PooledCrossover {
    pub max_retries: usize,
}

impl Default for PooledCrossover {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_SLOT_RETRIES,
        }
    }
}

impl CrossoverFunction<SlotKey> for PooledCrossover {
    fn crossover(
        &self,
        a: &Entry<SlotKey>,
        b: &Entry<SlotKey>,
        rng: &mut dyn RngCore,
    ) -> Option<Entry<SlotKey>> {
        if !same_shape(&a.key, &b.key) {
            return None;
        }
        let n = a.key.len();
        let mut child = Vec::with_capacity(n);
        for _ in 0..n {
            let value = draw_unused(&child, self.max_retries, rng, |rng| {
                let parent = if rng.gen_bool(0.5) { a } else { b };
                parent.key.slots()[rng.gen_range(0..n)]
            })?;
            child.push(value);
        }
        Some(Entry::new(SlotKey::new(child)))
    }

    fn name(&self) -> &str {
        "pooled"
    }
}

/// Child slot `i` is adopted from slot `i` of parent A or B. A collision is
/// redrawn from the pooled values of both parents.
#[derive(Debug, Clone)]
pub struct PositionalCrossover {
    pub max_retries: usize,
}

impl Default for PositionalCrossover {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_SLOT_RETRIES,
        }
    }
}

impl CrossoverFunction<SlotKey> for PositionalCrossover {
    fn crossover(
        &self,
        a: &Entry<SlotKey>,
        b: &Entry<SlotKey>,
        rng: &mut dyn RngCore,
    ) -> Option<Entry<SlotKey>> {
        if !same_shape(&a.key, &b.key) {
            return None;
        }
        let n = a.key.len();
        let pooled: Vec<u32> = a.key.slots().iter().chain(b.key.slots()).copied().collect();
        let mut child = Vec::with_capacity(n);
        for i in 0..n {
            let adopted = if rng.gen_bool(0.5) {
                a.key.slots()[i]
            } else {
                b.key.slots()[i]
            };
            let value = if child.contains(&adopted) {
                draw_unused(&child, self.max_retries, rng, |rng| {
                    pooled[rng.gen_range(0..pooled.len())]
                })?
            } else {
                adopted
            };
            child.push(value);
        }
        Some(Entry::new(SlotKey::new(child)))
    }

    fn name(&self) -> &str {
        "positional"
    }
}
