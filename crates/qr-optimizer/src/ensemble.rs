//! Ensemble of independently trained surrogate models.
//!
//! Each member is trained on its own random subsample of the training set so
//! the members disagree where data is thin. The spread of their predictions
//! is the uncertainty signal used by active learning.

use qr_types::{ConfigError, EntryCollection, EntryKey, ModelError, QrResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use crate::config::EnsembleConfig;
use crate::model::Model;

/// Builds one untrained member model from a seed.
pub type ModelFactory<K> = Arc<dyn Fn(u64) -> Box<dyn Model<K>> + Send + Sync>;

pub struct SurrogateEnsemble<K: EntryKey> {
    factory: ModelFactory<K>,
    member_count: usize,
    subsample_fraction: f64,
    members: Vec<Box<dyn Model<K>>>,
    training_set: Option<EntryCollection<K>>,
}

impl<K: EntryKey> SurrogateEnsemble<K> {
    pub fn new(factory: ModelFactory<K>, member_count: usize) -> Self {
        Self {
            factory,
            member_count,
            subsample_fraction: EnsembleConfig::default().subsample_fraction,
            members: Vec::new(),
            training_set: None,
        }
    }

    pub fn from_config(config: &EnsembleConfig, factory: ModelFactory<K>) -> QrResult<Self> {
        config.validate()?;
        Ok(Self::new(factory, config.members).with_subsample_fraction(config.subsample_fraction))
    }

    /// Fraction of the training set each member sees, clamped to `(0, 1]`
    /// at training time.
    pub fn with_subsample_fraction(mut self, fraction: f64) -> Self {
        self.subsample_fraction = fraction;
        self
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }

    pub fn is_trained(&self) -> bool {
        !self.members.is_empty()
    }

    /// The collection the members were last trained on.
    pub fn training_set(&self) -> Option<&EntryCollection<K>> {
        self.training_set.as_ref()
    }

    /// Train every member from scratch. Subsamples are drawn from `rng`
    /// up front so the result does not depend on thread scheduling.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        data: &EntryCollection<K>,
        rng: &mut R,
    ) -> QrResult<()> {
        if self.member_count == 0 {
            return Err(ConfigError::EmptyEnsemble.into());
        }
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet {
                model: "ensemble".to_string(),
            }
            .into());
        }

        let fraction = self.subsample_fraction.clamp(f64::MIN_POSITIVE, 1.0);
        let size = ((data.len() as f64 * fraction).ceil() as usize).clamp(1, data.len());
        let jobs: Vec<(u64, EntryCollection<K>)> = (0..self.member_count)
            .map(|_| {
                let seed: u64 = rng.gen();
                let subset = data.sample(size, &mut ChaCha8Rng::seed_from_u64(seed));
                (seed, subset)
            })
            .collect();

        let factory = &self.factory;
        let members = jobs
            .into_par_iter()
            .map(|(seed, subset)| -> QrResult<Box<dyn Model<K>>> {
                let mut model = factory(seed);
                model.train(&subset)?;
                Ok(model)
            })
            .collect::<QrResult<Vec<_>>>()?;

        debug!(
            "Trained {} ensemble members on {} of {} entries each",
            members.len(),
            size,
            data.len()
        );
        self.members = members;
        self.training_set = Some(data.clone());
        Ok(())
    }

    /// Raw predictions, indexed `[entry][member]`.
    pub fn predict_ensemble(&self, data: &EntryCollection<K>) -> QrResult<Vec<Vec<f64>>> {
        if self.members.is_empty() {
            return Err(ModelError::NotTrained {
                model: "ensemble".to_string(),
            }
            .into());
        }
        let by_member = self
            .members
            .par_iter()
            .map(|member| member.predict(data))
            .collect::<QrResult<Vec<Vec<f64>>>>()?;

        Ok((0..data.len())
            .map(|i| by_member.iter().map(|column| column[i]).collect())
            .collect())
    }

    /// Store member predictions and their mean on each entry of `data`.
    /// Returns the per-entry variance.
    pub fn annotate(&self, data: &mut EntryCollection<K>) -> QrResult<Vec<f64>> {
        let matrix = self.predict_ensemble(data)?;
        let mean = Self::mean(&matrix);
        data.set_predicted(&mean)?;
        data.set_ensemble_predictions(&matrix)?;
        Ok(Self::variance(&matrix))
    }

    /// Per-entry mean across members.
    pub fn mean(matrix: &[Vec<f64>]) -> Vec<f64> {
        matrix.iter().map(|row| row_mean(row)).collect()
    }

    /// Per-entry population variance across members.
    pub fn variance(matrix: &[Vec<f64>]) -> Vec<f64> {
        matrix
            .iter()
            .map(|row| {
                if row.is_empty() {
                    return 0.0;
                }
                let mean = row_mean(row);
                row.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / row.len() as f64
            })
            .collect()
    }
}

fn row_mean(row: &[f64]) -> f64 {
    if row.is_empty() {
        0.0
    } else {
        row.iter().sum::<f64>() / row.len() as f64
    }
}

impl<K: EntryKey> std::fmt::Debug for SurrogateEnsemble<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrogateEnsemble")
            .field("member_count", &self.member_count)
            .field("subsample_fraction", &self.subsample_fraction)
            .field("trained", &self.is_trained())
            .finish()
    }
}
