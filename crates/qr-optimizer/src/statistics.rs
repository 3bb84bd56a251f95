//! Per-generation progress statistics for a search run.

use qr_types::{EntryCollection, EntryKey, GenerationHistory, QrResult};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ranker::EntryRanker;

/// Default number of top search-space entries tracked.
pub const DEFAULT_TOP_ENTRIES: usize = 50;

/// Statistics for one generation. Population values cover every entry
/// evaluated up to and including this generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatistics {
    pub generation: usize,
    pub evaluated_so_far: usize,
    pub best_so_far: Option<f64>,
    /// `None` for an empty generation.
    pub generation_average: Option<f64>,
    pub generation_best: Option<f64>,
    /// Known top entries found so far, when the search space carries
    /// measured values.
    pub top_entries_found: Option<usize>,
    pub found_all_top: Option<bool>,
}

/// How a search run progressed, generation by generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatistics {
    pub number_top_entries: usize,
    /// Size of the known top set; smaller than `number_top_entries` when
    /// the search space is small, `None` when it is unknown.
    pub known_top_entries: Option<usize>,
    pub generations: Vec<GenerationStatistics>,
}

impl OptimizationStatistics {
    /// Evaluate `history` with the ranker's objective on measured values.
    pub fn evaluate<K: EntryKey>(
        history: &GenerationHistory<K>,
        ranker: &EntryRanker<K>,
        search_space: Option<&EntryCollection<K>>,
        number_top_entries: usize,
    ) -> QrResult<Self> {
        let top = search_space.and_then(|space| top_entries(space, ranker, number_top_entries));

        let mut population = match history.generation(0) {
            Some(initial) => initial.empty_clone(),
            None => EntryCollection::new(Vec::new()),
        };
        let mut generations = Vec::with_capacity(history.len());
        for (g, generation) in history.iter().enumerate() {
            population.combine(generation);

            let generation_values = ranker.objective_values(generation, true)?;
            let population_values = ranker.objective_values(&population, true)?;

            let top_entries_found = top
                .as_ref()
                .map(|top| top.keys().filter(|k| population.contains_key(k)).count());
            let found_all_top = top
                .as_ref()
                .zip(top_entries_found)
                .map(|(top, found)| found == top.len());

            generations.push(GenerationStatistics {
                generation: g,
                evaluated_so_far: population.len(),
                best_so_far: best(ranker, &population_values),
                generation_average: mean(&generation_values),
                generation_best: best(ranker, &generation_values),
                top_entries_found,
                found_all_top,
            });
        }

        Ok(Self {
            number_top_entries,
            known_top_entries: top.as_ref().map(EntryCollection::len),
            generations,
        })
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn last(&self) -> Option<&GenerationStatistics> {
        self.generations.last()
    }
}

/// Top `n` search-space entries by measured objective, or `None` if the
/// search space cannot be ranked on measured values.
fn top_entries<K: EntryKey>(
    space: &EntryCollection<K>,
    ranker: &EntryRanker<K>,
    n: usize,
) -> Option<EntryCollection<K>> {
    let ranked = ranker.rank(space, true).ok()?;
    Some(EntryCollection::from_entries(
        space.attribute_names().to_vec(),
        ranked.iter().take(n).map(|&i| space.entries()[i].clone()),
    ))
}

fn best<K: EntryKey>(ranker: &EntryRanker<K>, values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .reduce(|a, b| if ranker.is_better(b, a) { b } else { a })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

impl fmt::Display for OptimizationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_top = self.known_top_entries.is_some();
        write!(
            f,
            "{:>10} {:>14} {:>12} {:>18} {:>15}",
            "Generation", "EvaluatedSoFar", "BestSoFar", "GenerationAverage", "GenerationBest"
        )?;
        if with_top {
            write!(f, " {:>15} {:>11}", "TopEntriesFound", "FoundAllTop")?;
        }
        writeln!(f)?;

        for row in &self.generations {
            write!(
                f,
                "{:>10} {:>14} {:>12} {:>18} {:>15}",
                row.generation,
                row.evaluated_so_far,
                cell(row.best_so_far),
                cell(row.generation_average),
                cell(row.generation_best)
            )?;
            if with_top {
                let found = row.top_entries_found.unwrap_or(0);
                let all = row.found_all_top.unwrap_or(false);
                write!(f, " {found:>15} {all:>11}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
