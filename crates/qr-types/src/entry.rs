use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use crate::errors::QrResult;
use crate::validation_error;

/// Identity of a candidate in the search domain.
///
/// Two entries with equal keys are the same candidate no matter which
/// generation produced them.
pub trait EntryKey: Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> EntryKey for T where
    T: Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// Fixed-cardinality combinatorial identity: `K` ordered slots, each holding
/// one value (e.g. an element id per crystallographic site).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotKey(Vec<u32>);

impl SlotKey {
    pub fn new(slots: Vec<u32>) -> Self {
        Self(slots)
    }

    pub fn slots(&self) -> &[u32] {
        &self.0
    }

    pub fn slots_mut(&mut self) -> &mut [u32] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when no value appears in more than one slot.
    pub fn has_distinct_values(&self) -> bool {
        self.0
            .iter()
            .enumerate()
            .all(|(i, v)| !self.0[i + 1..].contains(v))
    }
}

impl From<Vec<u32>> for SlotKey {
    fn from(slots: Vec<u32>) -> Self {
        Self(slots)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// A candidate point plus everything known about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<K> {
    pub key: K,
    /// Numeric feature vector used by surrogate models.
    #[serde(default)]
    pub attributes: Option<Vec<f64>>,
    /// Ground truth, assigned once by an oracle.
    #[serde(default)]
    pub measured: Option<f64>,
    #[serde(default)]
    pub predicted: Option<f64>,
    /// Per-member predictions of an ensemble surrogate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble_predictions: Option<Vec<f64>>,
}

impl<K: EntryKey> Entry<K> {
    pub fn new(key: K) -> Self {
        Self {
            key,
            attributes: None,
            measured: None,
            predicted: None,
            ensemble_predictions: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<f64>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_measured(mut self, value: f64) -> Self {
        self.measured = Some(value);
        self
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn has_measurement(&self) -> bool {
        self.measured.is_some()
    }

    /// Record the ground-truth value. A different existing measurement is
    /// never overwritten.
    pub fn set_measured(&mut self, value: f64) -> QrResult<()> {
        match self.measured {
            Some(existing) if existing != value => Err(validation_error!(
                "entry {} already measured as {existing}, refusing {value}",
                self.key
            )),
            _ => {
                self.measured = Some(value);
                Ok(())
            }
        }
    }

    pub fn set_predicted(&mut self, value: f64) {
        self.predicted = Some(value);
    }

    /// Drop everything except identity and attributes.
    pub fn clear_values(&mut self) {
        self.measured = None;
        self.predicted = None;
        self.ensemble_predictions = None;
    }
}
