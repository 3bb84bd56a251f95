//! Ground-truth evaluation of candidate batches.
//!
//! An [`Oracle`] holds at most one outstanding batch. The backend that does
//! the actual work is pluggable: [`LookupOracle`] answers from a table of
//! known results, [`ComputeOracle`] calls a (possibly slow) function per
//! entry.

use qr_types::{Entry, EntryCollection, EntryKey, OracleError, QrError, QrResult};
use std::collections::HashMap;
use tracing::{debug, info};

/// Assigns measured values to every entry of a batch.
pub trait OracleBackend<K: EntryKey>: Send {
    /// Measure every entry in `batch` in place. May block arbitrarily long.
    fn evaluate(&mut self, batch: &mut EntryCollection<K>) -> QrResult<()>;

    fn name(&self) -> &str;
}

/// Single-outstanding-batch front end over an [`OracleBackend`].
pub struct Oracle<K: EntryKey> {
    backend: Box<dyn OracleBackend<K>>,
    pending: Option<EntryCollection<K>>,
}

impl<K: EntryKey> Oracle<K> {
    pub fn new(backend: Box<dyn OracleBackend<K>>) -> Self {
        Self {
            backend,
            pending: None,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The outstanding batch, if any.
    pub fn pending(&self) -> Option<&EntryCollection<K>> {
        self.pending.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Store a batch for evaluation. Fails if one is already outstanding.
    pub fn submit(&mut self, batch: EntryCollection<K>) -> QrResult<()> {
        if self.pending.is_some() {
            return Err(OracleError::misuse("a batch is already awaiting evaluation").into());
        }
        debug!("Oracle {} accepted batch of {}", self.backend.name(), batch.len());
        self.pending = Some(batch);
        Ok(())
    }

    /// Whether every entry in the outstanding batch has a measurement.
    pub fn is_complete(&self) -> QrResult<bool> {
        match &self.pending {
            Some(batch) => Ok(batch.all_measured()),
            None => Err(OracleError::misuse("no batch has been submitted").into()),
        }
    }

    /// Run the backend on the outstanding batch. This is the one blocking
    /// call in a search run.
    pub fn evaluate(&mut self) -> QrResult<()> {
        let batch = self
            .pending
            .as_mut()
            .ok_or_else(|| QrError::from(OracleError::misuse("no batch has been submitted")))?;
        info!(
            "Evaluating {} entries with {} oracle",
            batch.len(),
            self.backend.name()
        );
        self.backend.evaluate(batch)
    }

    /// Hand back the fully measured batch and free the slot.
    pub fn retrieve(&mut self) -> QrResult<EntryCollection<K>> {
        let batch = self
            .pending
            .as_ref()
            .ok_or_else(|| QrError::from(OracleError::misuse("no batch has been submitted")))?;
        if !batch.all_measured() {
            let missing = batch.iter().filter(|e| !e.has_measurement()).count();
            return Err(OracleError::Incomplete {
                missing,
                total: batch.len(),
            }
            .into());
        }
        self.pending
            .take()
            .ok_or_else(|| QrError::from(OracleError::misuse("no batch has been submitted")))
    }
}

impl<K: EntryKey> std::fmt::Debug for Oracle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("backend", &self.backend.name())
            .field("pending", &self.pending.as_ref().map(EntryCollection::len))
            .finish()
    }
}

// ---- Lookup backend ----

/// Answers from a table of already-measured entries. Any key missing from
/// the table fails the whole batch.
#[derive(Debug, Clone)]
pub struct LookupOracle<K: EntryKey> {
    table: HashMap<K, Entry<K>>,
}

impl<K: EntryKey> LookupOracle<K> {
    /// Build the table. Every entry must carry a measurement.
    pub fn new(data: &EntryCollection<K>) -> QrResult<Self> {
        let mut table = HashMap::with_capacity(data.len());
        for entry in data {
            if !entry.has_measurement() {
                return Err(OracleError::EvaluationFailed {
                    key: entry.key.to_string(),
                    message: "lookup table entry has no measured value".to_string(),
                }
                .into());
            }
            table.insert(entry.key.clone(), entry.clone());
        }
        Ok(Self { table })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<K: EntryKey> OracleBackend<K> for LookupOracle<K> {
    fn evaluate(&mut self, batch: &mut EntryCollection<K>) -> QrResult<()> {
        // Resolve everything first so a miss leaves the batch untouched
        let mut resolved = Vec::with_capacity(batch.len());
        for entry in batch.iter() {
            let known = self
                .table
                .get(&entry.key)
                .ok_or_else(|| OracleError::MissingEntry {
                    key: entry.key.to_string(),
                })?;
            resolved.push(known);
        }

        for (entry, known) in batch.iter_mut().zip(resolved) {
            if let Some(value) = known.measured {
                entry.set_measured(value)?;
            }
            if entry.attributes.is_none() {
                entry.attributes = known.attributes.clone();
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "lookup"
    }
}

// ---- Live computation backend ----

/// Calls `evaluate` for every entry that still lacks a measurement.
pub struct ComputeOracle<F> {
    evaluate: F,
}

impl<F> ComputeOracle<F> {
    pub fn new(evaluate: F) -> Self {
        Self { evaluate }
    }
}

impl<K, F> OracleBackend<K> for ComputeOracle<F>
where
    K: EntryKey,
    F: FnMut(&Entry<K>) -> QrResult<f64> + Send,
{
    fn evaluate(&mut self, batch: &mut EntryCollection<K>) -> QrResult<()> {
        for entry in batch.iter_mut() {
            if entry.has_measurement() {
                continue;
            }
            let value = (self.evaluate)(entry).map_err(|e| OracleError::EvaluationFailed {
                key: entry.key.to_string(),
                message: e.to_string(),
            })?;
            entry.set_measured(value)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "compute"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qr_types::{validation_error, SlotKey};

    fn key(slots: &[u32]) -> SlotKey {
        SlotKey::new(slots.to_vec())
    }

    fn table() -> EntryCollection<SlotKey> {
        EntryCollection::from_entries(
            vec!["a".into()],
            (0..5u32).map(|i| {
                Entry::new(key(&[i, i + 10]))
                    .with_attributes(vec![i as f64])
                    .with_measured(i as f64 * 2.0)
            }),
        )
    }

    fn batch(keys: &[[u32; 2]]) -> EntryCollection<SlotKey> {
        EntryCollection::from_entries(vec!["a".into()], keys.iter().map(|k| Entry::new(key(k))))
    }

    #[test]
    fn lookup_round_trip() {
        let mut oracle = Oracle::new(Box::new(LookupOracle::new(&table()).unwrap()));
        oracle.submit(batch(&[[1, 11], [3, 13]])).unwrap();
        assert!(!oracle.is_complete().unwrap());

        oracle.evaluate().unwrap();
        assert!(oracle.is_complete().unwrap());

        let done = oracle.retrieve().unwrap();
        assert_eq!(done.get(1).unwrap().measured, Some(6.0));
        assert_eq!(done.get(1).unwrap().attributes, Some(vec![3.0]));
        assert!(!oracle.has_pending());
    }

    #[test]
    fn double_submit_is_misuse() {
        let mut oracle = Oracle::new(Box::new(LookupOracle::new(&table()).unwrap()));
        oracle.submit(batch(&[[1, 11]])).unwrap();
        let err = oracle.submit(batch(&[[2, 12]])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn query_before_submit_is_misuse() {
        let mut oracle: Oracle<SlotKey> =
            Oracle::new(Box::new(LookupOracle::new(&table()).unwrap()));
        assert!(oracle.is_complete().unwrap_err().is_configuration());
        assert!(oracle.evaluate().unwrap_err().is_configuration());
        assert!(oracle.retrieve().unwrap_err().is_configuration());
    }

    #[test]
    fn retrieve_before_complete_fails() {
        let mut oracle = Oracle::new(Box::new(LookupOracle::new(&table()).unwrap()));
        oracle.submit(batch(&[[1, 11]])).unwrap();
        match oracle.retrieve() {
            Err(QrError::Oracle(OracleError::Incomplete { missing, total })) => {
                assert_eq!((missing, total), (1, 1));
            }
            other => panic!("expected incomplete error, got {other:?}"),
        }
        // Still pending after the failed retrieve
        assert!(oracle.has_pending());
    }

    #[test]
    fn lookup_miss_is_fatal_for_batch() {
        let mut oracle = Oracle::new(Box::new(LookupOracle::new(&table()).unwrap()));
        oracle.submit(batch(&[[1, 11], [7, 70]])).unwrap();
        match oracle.evaluate() {
            Err(QrError::Oracle(OracleError::MissingEntry { key })) => assert_eq!(key, "7-70"),
            other => panic!("expected missing entry, got {other:?}"),
        }
        // Nothing was silently filled in
        assert_eq!(oracle.pending().unwrap().get(0).unwrap().measured, None);
    }

    #[test]
    fn lookup_table_requires_measurements() {
        let data = EntryCollection::from_entries(vec![], vec![Entry::new(key(&[1, 2]))]);
        assert!(LookupOracle::new(&data).is_err());
    }

    #[test]
    fn compute_oracle_calls_function() {
        let backend = ComputeOracle::new(|e: &Entry<SlotKey>| -> QrResult<f64> {
            Ok(e.key.slots().iter().map(|v| f64::from(*v)).sum())
        });
        let mut oracle = Oracle::new(Box::new(backend));
        oracle.submit(batch(&[[1, 2], [3, 4]])).unwrap();
        oracle.evaluate().unwrap();
        let done = oracle.retrieve().unwrap();
        assert_eq!(done.measured_values(), vec![Some(3.0), Some(7.0)]);
    }

    #[test]
    fn compute_oracle_propagates_failures() {
        let backend = ComputeOracle::new(|e: &Entry<SlotKey>| -> QrResult<f64> {
            if e.key.slots()[0] == 3 {
                Err(validation_error!("diverged"))
            } else {
                Ok(1.0)
            }
        });
        let mut oracle = Oracle::new(Box::new(backend));
        oracle.submit(batch(&[[1, 2], [3, 4]])).unwrap();
        let err = oracle.evaluate().unwrap_err();
        assert!(err.to_string().contains("3-4"));
        assert!(!oracle.is_complete().unwrap());
    }
}
