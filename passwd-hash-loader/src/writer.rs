use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::record::HashRecord;
use crate::store::DocumentStore;

/// Serializes bulk inserts from all workers onto one store.
///
/// Only one `insert_batch` runs against the store at any moment; callers
/// queue up on an async mutex. Failed batches are not retried.
pub struct BulkWriter<S> {
    store: Arc<S>,
    lock: Mutex<()>,
    records_written: AtomicU64,
    batches_written: AtomicU64,
}

impl<S: DocumentStore> BulkWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
            records_written: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
        }
    }

    /// Writes one batch in a single bulk call. Returns the number of records
    /// written; an empty batch is a no-op.
    pub async fn insert_batch(&self, records: Vec<HashRecord>) -> Result<usize, Error> {
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();

        let _guard = self.lock.lock().await;
        self.store
            .insert_many(records)
            .await
            .map_err(|source| Error::WriteFailure { records: count, source })?;

        self.records_written.fetch_add(count as u64, Ordering::Relaxed);
        let batches = self.batches_written.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(records = count, batches, "bulk insert complete");

        Ok(count)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written.load(Ordering::Relaxed)
    }
}
