//! Surrogate models.

use qr_types::{Entry, EntryCollection, EntryKey, ModelError, QrResult};
use std::cmp::Ordering;

/// A trainable regressor from entry attributes to a fitness value.
pub trait Model<K: EntryKey>: Send + Sync {
    /// Train from scratch on the measured values of `data`.
    fn train(&mut self, data: &EntryCollection<K>) -> QrResult<()>;

    /// One prediction per entry of `data`, in order.
    fn predict(&self, data: &EntryCollection<K>) -> QrResult<Vec<f64>>;

    fn is_trained(&self) -> bool;

    fn name(&self) -> &str;
}

fn attributes_of<K: EntryKey>(entry: &Entry<K>) -> Result<&[f64], ModelError> {
    entry
        .attributes
        .as_deref()
        .ok_or_else(|| ModelError::MissingAttributes {
            key: entry.key.to_string(),
        })
}

/// k-nearest-neighbour regression over attribute vectors: the prediction is
/// the mean measured value of the `k` closest training points (Euclidean).
///
/// Training is deterministic and ignores the member seed, so ensemble members
/// built from this model differ only through their training subsamples.
#[derive(Debug, Clone)]
pub struct NearestNeighborModel {
    k: usize,
    points: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl NearestNeighborModel {
    /// `k` is clamped to at least 1.
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            points: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn dimension(&self) -> usize {
        self.points.first().map_or(0, Vec::len)
    }

    fn predict_point(&self, x: &[f64]) -> f64 {
        let mut distances: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let d2: f64 = p.iter().zip(x).map(|(a, b)| (a - b) * (a - b)).sum();
                (d2, i)
            })
            .collect();
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let k = self.k.min(distances.len());
        distances[..k].iter().map(|(_, i)| self.values[*i]).sum::<f64>() / k as f64
    }
}

impl Default for NearestNeighborModel {
    fn default() -> Self {
        Self::new(3)
    }
}

impl<K: EntryKey> Model<K> for NearestNeighborModel {
    fn train(&mut self, data: &EntryCollection<K>) -> QrResult<()> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet {
                model: "nearest_neighbor".to_string(),
            }
            .into());
        }

        let mut points = Vec::with_capacity(data.len());
        let mut values = Vec::with_capacity(data.len());
        let mut expected: Option<usize> = None;
        for entry in data {
            let x = attributes_of(entry)?;
            let width = *expected.get_or_insert(x.len());
            if x.len() != width {
                return Err(ModelError::AttributeMismatch {
                    key: entry.key.to_string(),
                    expected: width,
                    actual: x.len(),
                }
                .into());
            }
            let y = entry.measured.ok_or_else(|| ModelError::MissingMeasurement {
                key: entry.key.to_string(),
            })?;
            points.push(x.to_vec());
            values.push(y);
        }

        self.points = points;
        self.values = values;
        Ok(())
    }

    fn predict(&self, data: &EntryCollection<K>) -> QrResult<Vec<f64>> {
        if self.points.is_empty() {
            return Err(ModelError::NotTrained {
                model: "nearest_neighbor".to_string(),
            }
            .into());
        }
        let dimension = self.dimension();
        data.iter()
            .map(|entry| -> QrResult<f64> {
                let x = attributes_of(entry)?;
                if x.len() != dimension {
                    return Err(ModelError::AttributeMismatch {
                        key: entry.key.to_string(),
                        expected: dimension,
                        actual: x.len(),
                    }
                    .into());
                }
                Ok(self.predict_point(x))
            })
            .collect()
    }

    fn is_trained(&self) -> bool {
        !self.points.is_empty()
    }

    fn name(&self) -> &str {
        "nearest_neighbor"
    }
}
