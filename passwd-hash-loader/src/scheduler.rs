use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{DigestField, FailurePolicy, PipelineConfig};
use crate::error::Error;
use crate::queue::WorkQueue;
use crate::store::DocumentStore;
use crate::worker::{Worker, WorkerReport};
use crate::writer::BulkWriter;

type WorkerResult = Result<WorkerReport, Error>;
type Joined = Result<(task::Id, WorkerResult), JoinError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Dispatching,
    Draining,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Loading => "loading",
            Phase::Dispatching => "dispatching",
            Phase::Draining => "draining",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Outcome of a full scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Lines taken off the queue by workers.
    pub lines_dispatched: usize,
    pub workers_spawned: usize,
    pub records_written: u64,
    pub batches_written: u64,
    pub failed_workers: usize,
    pub cancelled_workers: usize,
    /// Records that were hashed but never stored: failed batches, batches
    /// dropped by cancelled workers, and those held by aborted tasks.
    pub lost_records: usize,
    pub peak_active: usize,
    /// Workers still running after both grace periods.
    pub unterminated_workers: usize,
    /// Wall-clock time from the start of dispatching to termination.
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Tally {
    failed: usize,
    cancelled: usize,
    lost: usize,
    /// Unflushed-record counters of the workers still in the set.
    unflushed: HashMap<task::Id, Arc<AtomicUsize>>,
}

/// Tracks how many workers are running and the highest count seen.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn enter(active: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { active: Arc::clone(active) }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Decides when workers run.
///
/// Admission is bounded by a semaphore holding `pool_size` permits: a worker
/// is submitted only after it acquires one, and the permit is released when
/// the worker's run ends. The run ends once the queue is closed and empty,
/// followed by an orderly shutdown with two bounded grace periods.
pub struct SubmissionScheduler<S> {
    queue: Arc<WorkQueue>,
    writer: Arc<BulkWriter<S>>,
    fields: Arc<[DigestField]>,
    pool_size: usize,
    batch_size: usize,
    grace_period: Duration,
    cancel_grace_period: Duration,
    failure_policy: FailurePolicy,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    active: Arc<AtomicUsize>,
    peak_active: Arc<AtomicUsize>,
    phase: Phase,
}

impl<S: DocumentStore> SubmissionScheduler<S> {
    pub fn new(
        config: &PipelineConfig,
        queue: Arc<WorkQueue>,
        writer: Arc<BulkWriter<S>>,
    ) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            queue,
            writer,
            fields: Arc::from(config.fields.clone()),
            pool_size: config.pool_size,
            batch_size: config.batch_size,
            grace_period: config.grace_period,
            cancel_grace_period: config.cancel_grace_period,
            failure_policy: config.failure_policy,
            permits: Arc::new(Semaphore::new(config.pool_size)),
            cancel: CancellationToken::new(),
            active: Arc::new(AtomicUsize::new(0)),
            peak_active: Arc::new(AtomicUsize::new(0)),
            phase: Phase::Loading,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Dispatches workers until the queue is exhausted, then shuts the pool
    /// down. With [`FailurePolicy::Abort`] the first worker failure stops
    /// dispatching and the run returns [`Error::Aborted`].
    pub async fn run_to_completion(mut self) -> Result<RunReport, Error> {
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        let mut tally = Tally::default();

        while self.queue.is_empty() && !self.queue.is_closed() {
            self.queue.wait_for_items().await;
        }

        self.enter(Phase::Dispatching);
        info!(
            pending = self.queue.len(),
            pool_size = self.pool_size,
            batch_size = self.batch_size,
            "dispatching workers"
        );
        let start = Instant::now();

        let spawned = self.dispatch(&mut workers, &mut tally).await;
        let aborted = self.should_abort(&tally);

        self.enter(Phase::Draining);
        if aborted {
            warn!(failed = tally.failed, "worker failed, aborting run");
            self.cancel.cancel();
        }
        let unterminated = self.drain(&mut workers, &mut tally).await;

        self.enter(Phase::Terminated);
        let elapsed = start.elapsed();
        let report = RunReport {
            lines_dispatched: self.queue.polled(),
            workers_spawned: spawned,
            records_written: self.writer.records_written(),
            batches_written: self.writer.batches_written(),
            failed_workers: tally.failed,
            cancelled_workers: tally.cancelled,
            lost_records: tally.lost,
            peak_active: self.peak_active.load(Ordering::SeqCst),
            unterminated_workers: unterminated,
            elapsed,
        };
        info!(
            lines = report.lines_dispatched,
            records = report.records_written,
            batches = report.batches_written,
            workers = report.workers_spawned,
            failed = report.failed_workers,
            "hash documents generated in {} ms",
            elapsed.as_millis()
        );

        if aborted {
            return Err(Error::Aborted { failed: tally.failed });
        }
        Ok(report)
    }

    /// Submits workers while the queue has items and a permit is free.
    /// Returns the number of workers spawned.
    async fn dispatch(&self, workers: &mut JoinSet<WorkerResult>, tally: &mut Tally) -> usize {
        let mut spawned = 0;

        loop {
            while let Some(result) = workers.try_join_next_with_id() {
                self.record(result, tally);
            }
            if self.should_abort(tally) || self.queue.is_exhausted() {
                return spawned;
            }
            if self.queue.is_empty() {
                // loader still running; keep reaping so failures surface now
                tokio::select! {
                    _ = self.queue.wait_for_items() => {}
                    Some(result) = workers.join_next_with_id(), if !workers.is_empty() => {
                        self.record(result, tally);
                    }
                }
                continue;
            }

            // a saturated pool may drain the queue before any permit frees up
            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return spawned,
                },
                _ = self.queue.wait_for_drain() => continue,
            };

            while let Some(result) = workers.try_join_next_with_id() {
                self.record(result, tally);
            }
            if self.should_abort(tally) || self.queue.is_empty() {
                continue;
            }

            let worker = Worker::new(
                spawned,
                Arc::clone(&self.queue),
                Arc::clone(&self.writer),
                Arc::clone(&self.fields),
                self.batch_size,
                self.cancel.clone(),
            );
            let unflushed = worker.unflushed_records();
            let active = ActiveGuard::enter(&self.active, &self.peak_active);
            let handle = workers.spawn(async move {
                let _permit = permit;
                let _active = active;
                worker.run().await
            });
            tally.unflushed.insert(handle.id(), unflushed);
            spawned += 1;
        }
    }

    /// Stops new submissions and waits for in-flight workers, cancelling them
    /// once the grace period runs out. Returns how many never terminated.
    async fn drain(&self, workers: &mut JoinSet<WorkerResult>, tally: &mut Tally) -> usize {
        self.permits.close();

        if tokio::time::timeout(self.grace_period, self.join_all(workers, tally))
            .await
            .is_ok()
        {
            return 0;
        }

        warn!(
            remaining = workers.len(),
            grace_period = ?self.grace_period,
            "workers still running after grace period, cancelling"
        );
        self.cancel.cancel();
        workers.abort_all();

        if tokio::time::timeout(self.cancel_grace_period, self.join_all(workers, tally))
            .await
            .is_ok()
        {
            return 0;
        }

        let remaining = workers.len();
        error!("{}", Error::PoolShutdownTimeout { remaining });
        remaining
    }

    async fn join_all(&self, workers: &mut JoinSet<WorkerResult>, tally: &mut Tally) {
        while let Some(result) = workers.join_next_with_id().await {
            self.record(result, tally);
        }
    }

    fn record(&self, result: Joined, tally: &mut Tally) {
        let id = match &result {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let unflushed = tally
            .unflushed
            .remove(&id)
            .map_or(0, |count| count.load(Ordering::Relaxed));

        match result {
            Ok((_, Ok(_))) => {}
            Ok((_, Err(Error::Cancelled { lost }))) => {
                tally.cancelled += 1;
                tally.lost += lost;
            }
            Ok((_, Err(Error::WriteFailure { records, .. }))) => {
                tally.failed += 1;
                tally.lost += records;
            }
            Ok((_, Err(_))) => tally.failed += 1,
            // aborted mid-run: whatever it held never reached the store
            Err(e) if e.is_cancelled() => {
                tally.cancelled += 1;
                tally.lost += unflushed;
            }
            Err(e) => {
                error!("{}", Error::WorkerTask(e.to_string()));
                tally.failed += 1;
                tally.lost += unflushed;
            }
        }
    }

    fn should_abort(&self, tally: &Tally) -> bool {
        self.failure_policy == FailurePolicy::Abort && tally.failed > 0
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = %self.phase, to = %phase, "scheduler phase change");
        self.phase = phase;
    }
}
