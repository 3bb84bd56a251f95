//! Pluggable genetic operators.
//!
//! Operators are capability traits over an [`EntryKey`] representation and
//! are looked up by name through an [`OperatorRegistry`]. The bundled
//! implementations work on [`SlotKey`](qr_types::SlotKey) identities with
//! distinct values per slot.

mod crossover;
mod mutation;
mod registry;

pub use crossover::{PooledCrossover, PositionalCrossover};
pub use mutation::{PooledMutation, PositionalMutation};
pub use registry::OperatorRegistry;

use qr_types::{Entry, EntryCollection, EntryKey, QrResult};
use rand::RngCore;

/// Retry budget for a single slot draw.
pub const DEFAULT_SLOT_RETRIES: usize = 1_000;

/// Produces one offspring from two parents.
pub trait CrossoverFunction<K: EntryKey>: Send + Sync {
    /// The child's identity is built only from values found in `a` and `b`.
    /// Returns `None` when no valid child was found within the retry budget.
    fn crossover(&self, a: &Entry<K>, b: &Entry<K>, rng: &mut dyn RngCore) -> Option<Entry<K>>;

    fn name(&self) -> &str;
}

/// Perturbs one entry in place.
pub trait MutationFunction<K: EntryKey>: Send + Sync {
    /// Derive whatever the mutation needs from the search space. Must be
    /// re-run whenever the search space changes.
    fn configure(&mut self, search_space: &EntryCollection<K>) -> QrResult<()>;

    fn is_configured(&self) -> bool;

    /// Whether `entry` has the shape this mutation was configured for.
    fn accepts(&self, entry: &Entry<K>) -> bool;

    /// Mutate in place. Returns whether the identity changed; a changed
    /// entry loses its attributes and values.
    fn mutate(&self, entry: &mut Entry<K>, rng: &mut dyn RngCore) -> bool;

    fn name(&self) -> &str;
}
