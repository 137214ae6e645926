//! In-memory store fakes shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::StoreError;
use crate::record::HashRecord;
use crate::store::DocumentStore;

/// Keeps every inserted batch and asserts inserts never overlap.
#[derive(Default)]
pub struct RecordingStore {
    batches: Mutex<Vec<Vec<HashRecord>>>,
    in_flight: AtomicBool,
    delay: Option<Duration>,
    blocking: Option<Duration>,
    fail: bool,
}

impl RecordingStore {
    /// Holds each insert open for `delay`, yielding to the runtime.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Default::default() }
    }

    /// Blocks the executing thread for `duration` inside each insert, so the
    /// task cannot be aborted while it runs.
    pub fn blocking(duration: Duration) -> Self {
        Self { blocking: Some(duration), ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    /// Rejects each insert after holding it open for `delay`.
    pub fn failing_after(delay: Duration) -> Self {
        Self { delay: Some(delay), fail: true, ..Default::default() }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|r| r.text.clone())
            .collect()
    }

    pub fn batches(&self) -> Vec<Vec<HashRecord>> {
        self.batches.lock().unwrap().clone()
    }
}

impl DocumentStore for RecordingStore {
    async fn insert_many(&self, records: Vec<HashRecord>) -> Result<(), StoreError> {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "bulk insert entered while another was in flight"
        );

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(duration) = self.blocking {
            std::thread::sleep(duration);
        }

        let result = if self.fail {
            Err(StoreError::Rejected("store unavailable".to_string()))
        } else {
            self.batches.lock().unwrap().push(records);
            Ok(())
        };

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

/// `count` records without digests, texts `"0"`, `"1"`, ...
pub fn records(count: usize) -> Vec<HashRecord> {
    (0..count)
        .map(|i| HashRecord { text: i.to_string(), digests: Vec::new() })
        .collect()
}
