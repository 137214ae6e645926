//! Hashes a plaintext password list and bulk-loads the results into a
//! document store.
//!
//! Every line of the input file becomes one document:
//!
//! ```text
//! { "txt": "password", "SHA256": "5e884898da28047151d0e56f8dc62927...", ... }
//! ```
//!
//! with one field per configured digest algorithm (see
//! [`passwd_digest::Algorithm`]).
//!
//! # Pipeline
//!
//! - [`load_file`] streams the input into a shared [`WorkQueue`] and closes it.
//! - [`SubmissionScheduler`] admits at most `pool_size` [`Worker`]s at a time.
//! - Each worker polls the queue, hashes each line into a [`HashRecord`] and
//!   collects records in its own [`BatchAccumulator`].
//! - A full batch, or the leftover batch once the queue runs dry, goes to the
//!   [`BulkWriter`], which issues one bulk insert at a time against the
//!   [`DocumentStore`].
//!
//! The run ends when the queue is closed and empty. In-flight workers then get
//! a grace period to finish before they are cancelled; a cancelled worker loses
//! its unflushed batch.
//!
//! # Failures
//!
//! A failed bulk insert ends the worker that issued it and the batch is lost;
//! nothing is retried. The scheduler either keeps going or aborts the run,
//! depending on [`FailurePolicy`].
//!
//! # Usage
//!
//! ```sh
//! passwd-hash-loader passwords.txt --algorithm sha256,sha512 --db-address ws://127.0.0.1:8000
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod loader;
pub mod queue;
pub mod record;
pub mod scheduler;
pub mod store;
pub mod worker;
pub mod writer;

#[cfg(test)]
mod testing;

pub use batch::BatchAccumulator;
pub use config::{DigestField, FailurePolicy, PipelineConfig};
pub use error::{Error, StoreError};
pub use loader::load_file;
pub use queue::WorkQueue;
pub use record::HashRecord;
pub use scheduler::{Phase, RunReport, SubmissionScheduler};
pub use store::{DocumentStore, StoreConfig, SurrealStore};
pub use worker::{Worker, WorkerReport};
pub use writer::BulkWriter;
