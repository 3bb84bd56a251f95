//! Objective functions and best-first ranking of entries.

use qr_types::{Entry, EntryCollection, EntryKey, QrResult, RankingError};
use std::cmp::Ordering;

use crate::config::ObjectiveDirection;

/// Maps an entry to a scalar objective value.
pub trait ObjectiveFunction<K: EntryKey>: Send + Sync {
    /// Objective value of `entry`, computed from its measured value when
    /// `use_measured` is set and from its predicted value otherwise.
    fn evaluate(&self, entry: &Entry<K>, use_measured: bool) -> QrResult<f64>;

    /// Registry name.
    fn name(&self) -> &str;
}

/// Measured or predicted value of `entry`, or a ranking error naming it.
pub fn entry_value<K: EntryKey>(entry: &Entry<K>, use_measured: bool) -> QrResult<f64> {
    let (value, kind) = if use_measured {
        (entry.measured, "measured")
    } else {
        (entry.predicted, "predicted")
    };
    let value = value.ok_or_else(|| RankingError::MissingValue {
        key: entry.key.to_string(),
        kind: kind.to_string(),
    })?;
    if !value.is_finite() {
        return Err(RankingError::NonFinite {
            key: entry.key.to_string(),
        }
        .into());
    }
    Ok(value)
}

/// The value itself.
#[derive(Debug, Clone, Default)]
pub struct SimpleObjective;

impl<K: EntryKey> ObjectiveFunction<K> for SimpleObjective {
    fn evaluate(&self, entry: &Entry<K>, use_measured: bool) -> QrResult<f64> {
        entry_value(entry, use_measured)
    }

    fn name(&self) -> &str {
        "simple"
    }
}

/// Absolute distance from a target value. Pair with
/// [`ObjectiveDirection::Minimize`] to search for entries close to the target.
#[derive(Debug, Clone)]
pub struct TargetObjective {
    pub target: f64,
}

impl TargetObjective {
    pub fn new(target: f64) -> Self {
        Self { target }
    }
}

impl<K: EntryKey> ObjectiveFunction<K> for TargetObjective {
    fn evaluate(&self, entry: &Entry<K>, use_measured: bool) -> QrResult<f64> {
        Ok((entry_value(entry, use_measured)? - self.target).abs())
    }

    fn name(&self) -> &str {
        "target"
    }
}

/// Stable argsort: indices of `values`, best first. Ties keep their original
/// order.
pub fn rank_indices(values: &[f64], descending: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let cmp = values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal);
        if descending {
            cmp.reverse()
        } else {
            cmp
        }
    });
    order
}

/// Ranks entries best→worst by an objective function.
pub struct EntryRanker<K: EntryKey> {
    objective: Box<dyn ObjectiveFunction<K>>,
    direction: ObjectiveDirection,
}

impl<K: EntryKey> EntryRanker<K> {
    pub fn new(objective: Box<dyn ObjectiveFunction<K>>, direction: ObjectiveDirection) -> Self {
        Self {
            objective,
            direction,
        }
    }

    /// Rank on the raw value with the given direction.
    pub fn simple(direction: ObjectiveDirection) -> Self {
        Self::new(Box::new(SimpleObjective), direction)
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: ObjectiveDirection) {
        self.direction = direction;
    }

    pub fn is_maximizing(&self) -> bool {
        self.direction == ObjectiveDirection::Maximize
    }

    pub fn objective_name(&self) -> &str {
        self.objective.name()
    }

    /// Objective value of one entry.
    pub fn objective_value(&self, entry: &Entry<K>, use_measured: bool) -> QrResult<f64> {
        self.objective.evaluate(entry, use_measured)
    }

    /// Objective value of every entry, in collection order.
    pub fn objective_values(
        &self,
        data: &EntryCollection<K>,
        use_measured: bool,
    ) -> QrResult<Vec<f64>> {
        data.iter()
            .map(|e| self.objective.evaluate(e, use_measured))
            .collect()
    }

    /// Entry indices, best first. Fails if any entry lacks the requested
    /// value.
    pub fn rank(&self, data: &EntryCollection<K>, use_measured: bool) -> QrResult<Vec<usize>> {
        let values = self.objective_values(data, use_measured)?;
        Ok(rank_indices(&values, self.is_maximizing()))
    }

    /// `true` when objective value `a` is strictly better than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self.direction {
            ObjectiveDirection::Maximize => a > b,
            ObjectiveDirection::Minimize => a < b,
        }
    }
}

impl<K: EntryKey> std::fmt::Debug for EntryRanker<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryRanker")
            .field("objective", &self.objective.name())
            .field("direction", &self.direction)
            .finish()
    }
}
