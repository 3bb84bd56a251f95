//! Ordered, duplicate-free entry sets.

use rand::seq::index;
use rand::Rng;
use std::collections::HashMap;

use crate::entry::{Entry, EntryKey};
use crate::errors::QrResult;
use crate::validation_error;

/// An ordered set of entries sharing one attribute schema.
///
/// Entries are unique by key; the first-seen copy wins and insertion order is
/// preserved.
#[derive(Debug, Clone)]
pub struct EntryCollection<K: EntryKey> {
    attribute_names: Vec<String>,
    entries: Vec<Entry<K>>,
    index: HashMap<K, usize>,
}

impl<K: EntryKey> EntryCollection<K> {
    pub fn new(attribute_names: Vec<String>) -> Self {
        Self {
            attribute_names,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a collection, silently dropping later duplicates.
    pub fn from_entries(
        attribute_names: Vec<String>,
        entries: impl IntoIterator<Item = Entry<K>>,
    ) -> Self {
        let mut collection = Self::new(attribute_names);
        for entry in entries {
            collection.add_entry(entry);
        }
        collection
    }

    /// Same schema, no entries.
    pub fn empty_clone(&self) -> Self {
        Self::new(self.attribute_names.clone())
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// Insert `entry` unless its key is already present. Returns whether it
    /// was inserted.
    pub fn add_entry(&mut self, entry: Entry<K>) -> bool {
        if self.index.contains_key(&entry.key) {
            return false;
        }
        self.index.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Union with `other`, keeping first-seen order.
    pub fn combine(&mut self, other: &EntryCollection<K>) {
        for entry in &other.entries {
            if !self.index.contains_key(&entry.key) {
                self.add_entry(entry.clone());
            }
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn contains(&self, entry: &Entry<K>) -> bool {
        self.contains_key(&entry.key)
    }

    pub fn position(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, i: usize) -> Option<&Entry<K>> {
        self.entries.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Entry<K>> {
        self.entries.get_mut(i)
    }

    pub fn get_by_key(&self, key: &K) -> Option<&Entry<K>> {
        self.position(key).map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry<K>> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entry<K>> {
        self.entries.iter_mut()
    }

    pub fn entries(&self) -> &[Entry<K>] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|e| &e.key)
    }

    pub fn into_entries(self) -> Vec<Entry<K>> {
        self.entries
    }

    /// Entries of `self` whose keys are absent from `other`, in order.
    pub fn without(&self, other: &EntryCollection<K>) -> Self {
        Self::from_entries(
            self.attribute_names.clone(),
            self.entries
                .iter()
                .filter(|e| !other.contains_key(&e.key))
                .cloned(),
        )
    }

    /// Random subset of up to `n` entries, drawn without replacement. The
    /// subset keeps the relative order of the source.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Self {
        let n = n.min(self.len());
        let mut picked = index::sample(rng, self.len(), n).into_vec();
        picked.sort_unstable();
        Self::from_entries(
            self.attribute_names.clone(),
            picked.into_iter().map(|i| self.entries[i].clone()),
        )
    }

    /// Like [`sample`](Self::sample) but removes the drawn entries from
    /// `self`.
    pub fn split_random<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Self {
        let picked = self.sample(n, rng);
        if !picked.is_empty() {
            self.retain(|e| !picked.contains_key(&e.key));
        }
        picked
    }

    /// Keep only entries matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&Entry<K>) -> bool) {
        self.entries.retain(|e| keep(e));
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key.clone(), i))
            .collect();
    }

    /// Assign one predicted value per entry, in order.
    pub fn set_predicted(&mut self, values: &[f64]) -> QrResult<()> {
        if values.len() != self.len() {
            return Err(validation_error!(
                "expected {} predictions, got {}",
                self.len(),
                values.len()
            ));
        }
        for (entry, value) in self.entries.iter_mut().zip(values) {
            entry.predicted = Some(*value);
        }
        Ok(())
    }

    /// Assign one row of member predictions per entry, in order.
    pub fn set_ensemble_predictions(&mut self, rows: &[Vec<f64>]) -> QrResult<()> {
        if rows.len() != self.len() {
            return Err(validation_error!(
                "expected {} prediction rows, got {}",
                self.len(),
                rows.len()
            ));
        }
        for (entry, row) in self.entries.iter_mut().zip(rows) {
            entry.ensemble_predictions = Some(row.clone());
        }
        Ok(())
    }

    pub fn all_measured(&self) -> bool {
        self.entries.iter().all(Entry::has_measurement)
    }

    /// Measured values, `None` where missing.
    pub fn measured_values(&self) -> Vec<Option<f64>> {
        self.entries.iter().map(|e| e.measured).collect()
    }

    /// Replace the contents with `entries`, keeping the schema.
    pub fn replace_entries(&mut self, entries: impl IntoIterator<Item = Entry<K>>) {
        self.entries.clear();
        self.index.clear();
        for entry in entries {
            self.add_entry(entry);
        }
    }
}

impl<K: EntryKey> Default for EntryCollection<K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<'a, K: EntryKey> IntoIterator for &'a EntryCollection<K> {
    type Item = &'a Entry<K>;
    type IntoIter = std::slice::Iter<'a, Entry<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: EntryKey> FromIterator<Entry<K>> for EntryCollection<K> {
    fn from_iter<I: IntoIterator<Item = Entry<K>>>(iter: I) -> Self {
        Self::from_entries(Vec::new(), iter)
    }
}
