//! msearch store: the active dataset's records, swapped wholesale.
//!
//! Loads are ticketed. `begin` hands out a new generation and publishes it as the
//! requested one; `commit` installs records only for the latest ticket, so a slow
//! fetch for a dataset that is no longer selected never becomes visible. Readers
//! always see one complete `RecordSet`.

#![forbid(unsafe_code)]

use arc_swap::ArcSwap;
use msearch_core::{Dataset, DatasetLoadError, Record, RecordSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod source;

pub use source::{load_catalog, FsSource, MemorySource, RecordSource};

/// Handed out by `RecordStore::begin`; identifies one load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub dataset: Dataset,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Installed(Arc<RecordSet>),
    /// A newer load began; the records were dropped.
    Superseded { generation: u64 },
}

struct Inner {
    snap: ArcSwap<RecordSet>,
    requested_tx: watch::Sender<u64>,
    epoch_tx: watch::Sender<u64>,
}

/// Shared handle; clones point at the same store. Meant to have one writer
/// (the session that calls `begin`/`commit`) and any number of readers.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<Inner>,
}

impl Default for RecordStore {
    fn default() -> Self { Self::new() }
}

impl RecordStore {
    pub fn new() -> Self {
        let (requested_tx, _) = watch::channel(0u64);
        let (epoch_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(Inner {
                snap: ArcSwap::from_pointee(RecordSet::default()),
                requested_tx,
                epoch_tx,
            }),
        }
    }

    pub fn current(&self) -> Arc<RecordSet> { self.inner.snap.load_full() }

    /// Generation of the most recently installed record set.
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.inner.epoch_tx.subscribe() }

    /// Generation of the most recently started load.
    pub fn subscribe_requested(&self) -> watch::Receiver<u64> { self.inner.requested_tx.subscribe() }

    pub fn requested(&self) -> u64 { *self.inner.requested_tx.borrow() }

    pub fn begin(&self, dataset: Dataset) -> LoadTicket {
        let generation = self.requested() + 1;
        self.inner.requested_tx.send_replace(generation);
        debug!(dataset = %dataset.key, generation, "load started");
        LoadTicket { generation, dataset }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool { ticket.generation == self.requested() }

    pub fn commit(&self, ticket: LoadTicket, records: Vec<Record>) -> LoadOutcome {
        if !self.is_current(&ticket) {
            debug!(dataset = %ticket.dataset.key, generation = ticket.generation, "discarding superseded load");
            return LoadOutcome::Superseded { generation: ticket.generation };
        }
        let generation = ticket.generation;
        let dataset_key = ticket.dataset.key.clone();
        let next = Arc::new(RecordSet::new(generation, ticket.dataset, records));
        self.inner.snap.store(Arc::clone(&next));
        self.inner.epoch_tx.send_replace(generation);
        info!(dataset = %dataset_key, generation, records = next.len(), "dataset installed");
        LoadOutcome::Installed(next)
    }

    /// Fetch and commit in one go. On failure the previous contents stay in place.
    pub async fn load(&self, source: &dyn RecordSource, ticket: LoadTicket) -> Result<LoadOutcome, DatasetLoadError> {
        match source.fetch(&ticket.dataset).await {
            Ok(records) => Ok(self.commit(ticket, records)),
            Err(e) => {
                self.fail(&ticket, &e);
                Err(e)
            }
        }
    }

    /// Record a failed fetch. The installed record set is left untouched.
    pub fn fail(&self, ticket: &LoadTicket, error: &DatasetLoadError) {
        warn!(dataset = %ticket.dataset.key, generation = ticket.generation, error = %error, "dataset load failed");
        metrics::counter!("dataset_load_failures_total", 1u64);
    }
}
