//! Append-only record of evaluated generations.

use crate::collection::EntryCollection;
use crate::entry::EntryKey;

/// Generation index → entries evaluated in that generation.
///
/// Generation 0 is always the caller-supplied initial data.
#[derive(Debug, Clone)]
pub struct GenerationHistory<K: EntryKey> {
    generations: Vec<EntryCollection<K>>,
}

impl<K: EntryKey> GenerationHistory<K> {
    pub fn new(initial: EntryCollection<K>) -> Self {
        Self {
            generations: vec![initial],
        }
    }

    /// Append the next generation and return its index.
    pub fn push(&mut self, evaluated: EntryCollection<K>) -> usize {
        self.generations.push(evaluated);
        self.generations.len() - 1
    }

    pub fn generation(&self, g: usize) -> Option<&EntryCollection<K>> {
        self.generations.get(g)
    }

    pub fn initial(&self) -> &EntryCollection<K> {
        &self.generations[0]
    }

    /// Number of recorded generations, including generation 0.
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Union of generations `0..g`: everything evaluated strictly before
    /// generation `g`. Generation 0 is always included.
    pub fn full_dataset(&self, g: usize) -> EntryCollection<K> {
        let mut output = self.generations[0].clone();
        for generation in self.generations.iter().take(g.min(self.len())).skip(1) {
            output.combine(generation);
        }
        output
    }

    /// Union of every recorded generation.
    pub fn all(&self) -> EntryCollection<K> {
        self.full_dataset(self.len())
    }

    /// Union of the generations in `from..to`.
    pub fn window(&self, from: usize, to: usize) -> EntryCollection<K> {
        let mut output = self.generations[0].empty_clone();
        for generation in self
            .generations
            .iter()
            .take(to.min(self.len()))
            .skip(from)
        {
            output.combine(generation);
        }
        output
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntryCollection<K>> {
        self.generations.iter()
    }
}
