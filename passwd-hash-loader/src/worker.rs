use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::batch::BatchAccumulator;
use crate::config::DigestField;
use crate::error::Error;
use crate::queue::WorkQueue;
use crate::record::HashRecord;
use crate::store::DocumentStore;
use crate::writer::BulkWriter;

/// Totals of one completed worker run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub records: usize,
    pub batches: usize,
}

/// One worker invocation: drains the queue into batches until a poll comes
/// back empty.
pub struct Worker<S> {
    id: usize,
    queue: Arc<WorkQueue>,
    writer: Arc<BulkWriter<S>>,
    fields: Arc<[DigestField]>,
    batch_size: usize,
    cancel: CancellationToken,
    unflushed: Arc<AtomicUsize>,
}

impl<S: DocumentStore> Worker<S> {
    pub fn new(
        id: usize,
        queue: Arc<WorkQueue>,
        writer: Arc<BulkWriter<S>>,
        fields: Arc<[DigestField]>,
        batch_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            queue,
            writer,
            fields,
            batch_size,
            cancel,
            unflushed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Records this worker has hashed but not yet seen stored. The handle
    /// outlives the worker, so it still reads correctly after its task is
    /// aborted.
    pub fn unflushed_records(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.unflushed)
    }

    /// Runs to completion. Failures are logged here and handed back to the
    /// scheduler, which applies the configured failure policy.
    pub async fn run(self) -> Result<WorkerReport, Error> {
        let result = self.drain_queue().await;

        match &result {
            Ok(report) if report.records > 0 => {
                debug!(
                    worker = self.id,
                    records = report.records,
                    batches = report.batches,
                    "worker finished"
                );
            }
            Ok(_) => {}
            Err(Error::Cancelled { lost }) => {
                warn!(worker = self.id, lost, "worker cancelled, partial batch dropped");
            }
            Err(e) => error!(worker = self.id, error = %e, "worker run failed"),
        }

        result
    }

    async fn drain_queue(&self) -> Result<WorkerReport, Error> {
        let mut report = WorkerReport::default();
        let mut batch = BatchAccumulator::new(self.batch_size);

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled { lost: batch.len() });
            }
            let Some(line) = self.queue.poll() else {
                break;
            };

            let full = batch.append(HashRecord::compute(line, &self.fields));
            self.unflushed.store(batch.len(), Ordering::Relaxed);
            if full {
                report.records += self.flush(&mut batch).await?;
                report.batches += 1;
            }
        }

        // queue exhausted for this run: flush the remainder
        if !batch.is_empty() {
            report.records += self.flush(&mut batch).await?;
            report.batches += 1;
        }

        Ok(report)
    }

    /// Hands the batch to the writer. Cancellation abandons the insert and
    /// counts the whole batch as lost.
    async fn flush(&self, batch: &mut BatchAccumulator) -> Result<usize, Error> {
        let records = batch.drain_all();
        let count = records.len();

        let written = tokio::select! {
            biased;
            written = self.writer.insert_batch(records) => written?,
            _ = self.cancel.cancelled() => return Err(Error::Cancelled { lost: count }),
        };
        self.unflushed.store(0, Ordering::Relaxed);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use passwd_digest::Algorithm;

    use super::*;
    use crate::testing::RecordingStore;

    fn setup(
        lines: usize,
        batch_size: usize,
        store: RecordingStore,
    ) -> (Worker<RecordingStore>, Arc<RecordingStore>, CancellationToken) {
        let queue = Arc::new(WorkQueue::new());
        for i in 0..lines {
            queue.offer(format!("pw{i}")).unwrap();
        }
        queue.close();

        let store = Arc::new(store);
        let writer = Arc::new(BulkWriter::new(Arc::clone(&store)));
        let fields: Arc<[DigestField]> = Arc::from(vec![DigestField::new(Algorithm::Sha1)]);
        let cancel = CancellationToken::new();
        let worker = Worker::new(0, queue, writer, fields, batch_size, cancel.clone());

        (worker, store, cancel)
    }

    #[tokio::test]
    async fn test_empty_queue_is_noop() {
        let (worker, store, _) = setup(0, 10, RecordingStore::default());
        assert_eq!(worker.run().await.unwrap(), WorkerReport::default());
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_partial_batch_flushed_once_on_drain() {
        let (worker, store, _) = setup(7, 10, RecordingStore::default());
        let report = worker.run().await.unwrap();

        assert_eq!(report, WorkerReport { records: 7, batches: 1 });
        assert_eq!(store.batch_sizes(), vec![7]);
    }

    #[tokio::test]
    async fn test_exact_capacity_single_flush() {
        let (worker, store, _) = setup(10, 10, RecordingStore::default());
        worker.run().await.unwrap();
        assert_eq!(store.batch_sizes(), vec![10]);
    }

    #[tokio::test]
    async fn test_flushes_every_capacity_records() {
        let (worker, store, _) = setup(25, 10, RecordingStore::default());
        let unflushed = worker.unflushed_records();
        let report = worker.run().await.unwrap();

        assert_eq!(report, WorkerReport { records: 25, batches: 3 });
        assert_eq!(unflushed.load(Ordering::Relaxed), 0);
        assert_eq!(store.batch_sizes(), vec![10, 10, 5]);

        // nothing dropped or duplicated across flush boundaries, order kept
        let expected: Vec<String> = (0..25).map(|i| format!("pw{i}")).collect();
        assert_eq!(store.texts(), expected);
    }

    #[tokio::test]
    async fn test_records_carry_digests() {
        let (worker, store, _) = setup(1, 10, RecordingStore::default());
        worker.run().await.unwrap();

        let batches = store.batches();
        let record = &batches[0][0];
        assert_eq!(record.text, "pw0");
        assert_eq!(
            record.digest("SHA1"),
            Some(passwd_digest::digest(b"pw0", Algorithm::Sha1).hex.as_str())
        );
    }

    #[tokio::test]
    async fn test_write_failure_ends_run() {
        let (worker, _, _) = setup(5, 2, RecordingStore::failing());
        let err = worker.run().await.unwrap_err();
        assert!(matches!(err, Error::WriteFailure { records: 2, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_worker_stops() {
        let (worker, store, cancel) = setup(5, 10, RecordingStore::default());
        cancel.cancel();

        let err = worker.run().await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { lost: 0 }));
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_flush_loses_held_batch() {
        let (worker, store, cancel) =
            setup(3, 10, RecordingStore::with_delay(Duration::from_secs(30)));
        let handle = tokio::spawn(worker.run());

        // lets the worker hash all three lines and start the slow insert
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled { lost: 3 }));
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_aborted_worker_leaves_unflushed_count() {
        let (worker, store, _) = setup(3, 10, RecordingStore::with_delay(Duration::from_secs(30)));
        let unflushed = worker.unflushed_records();
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();

        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(unflushed.load(Ordering::Relaxed), 3);
        assert!(store.batch_sizes().is_empty());
    }
}
