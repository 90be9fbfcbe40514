//! Bounded, time-ordered pnl history with batched persistence.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::StoreError;
use crate::logging::{agg_increment, log, log_persist, log_sample, log_storage_failure, obj, v_str, Domain, Level};
use crate::storage::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
    pub pnl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Below the batch size; nothing written yet.
    Deferred { pending: u32 },
    Written { samples: usize },
}

pub struct HistoryStore<S> {
    samples: Vec<Sample>,
    unsaved: u32,
    max_points: usize,
    batch_size: u32,
    key: String,
    store: S,
}

impl<S: KvStore> HistoryStore<S> {
    pub fn new(store: S, key: &str, max_points: usize, batch_size: u32) -> Self {
        Self {
            samples: Vec::new(),
            unsaved: 0,
            max_points: max_points.max(1),
            batch_size: batch_size.max(1),
            key: key.to_string(),
            store,
        }
    }

    /// Replace the in-memory history with the persisted record.
    ///
    /// On failure the history is left empty; the error is returned so the
    /// caller can report it, but tracking carries on either way.
    pub fn load(&mut self) -> Result<usize, StoreError> {
        self.samples.clear();
        self.unsaved = 0;
        let raw = match self.store.get(&self.key) {
            Ok(raw) => raw,
            Err(err) => {
                log_storage_failure("get", &self.key, &err);
                return Err(err);
            }
        };
        let Some(raw) = raw else {
            return Ok(0);
        };
        let mut samples: Vec<Sample> = match serde_json::from_str(&raw) {
            Ok(samples) => samples,
            Err(err) => {
                let err = StoreError::from(err);
                log_storage_failure("decode", &self.key, &err);
                return Err(err);
            }
        };
        // stable: keeps acquisition order for equal timestamps
        samples.sort_by_key(|s| s.timestamp);
        self.samples = samples;
        let evicted = self.prune();
        log(
            Level::Info,
            Domain::History,
            "loaded",
            obj(&[
                ("key", v_str(&self.key)),
                ("samples", json!(self.samples.len())),
                ("evicted", json!(evicted)),
            ]),
        );
        Ok(self.samples.len())
    }

    /// Record `pnl` at the current wall-clock time.
    pub fn append(&mut self, pnl: f64) -> Result<PersistOutcome, StoreError> {
        self.append_at(Utc::now().timestamp_millis(), pnl)
    }

    pub fn append_at(&mut self, timestamp: i64, pnl: f64) -> Result<PersistOutcome, StoreError> {
        self.samples.push(Sample { timestamp, pnl });
        let evicted = self.prune();
        agg_increment("sample");
        log_sample(timestamp, pnl, self.samples.len(), evicted);
        self.persist(false)
    }

    /// Flush to the store. Unforced calls only write every `batch_size` calls.
    pub fn persist(&mut self, force: bool) -> Result<PersistOutcome, StoreError> {
        if !force {
            self.unsaved += 1;
            if self.unsaved < self.batch_size {
                return Ok(PersistOutcome::Deferred { pending: self.unsaved });
            }
        }
        self.unsaved = 0;
        let body = serde_json::to_string(&self.samples)?;
        match self.store.set(&self.key, &body) {
            Ok(()) => {
                log_persist(&self.key, self.samples.len(), force);
                Ok(PersistOutcome::Written { samples: self.samples.len() })
            }
            Err(err) => {
                log_storage_failure("set", &self.key, &err);
                Err(err)
            }
        }
    }

    /// Drop all samples and immediately persist the empty history.
    pub fn reset(&mut self) -> Result<PersistOutcome, StoreError> {
        let dropped = self.samples.len();
        self.samples.clear();
        self.unsaved = 0;
        log(
            Level::Info,
            Domain::History,
            "reset",
            obj(&[("dropped", json!(dropped))]),
        );
        self.persist(true)
    }

    /// Final flush before the owner goes away.
    pub fn dispose(mut self) -> Result<PersistOutcome, StoreError> {
        self.persist(true)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn unsaved(&self) -> u32 {
        self.unsaved
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn prune(&mut self) -> usize {
        if self.samples.len() <= self.max_points {
            return 0;
        }
        let drop_n = self.samples.len() - self.max_points;
        self.samples.drain(0..drop_n);
        drop_n
    }
}
