use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read input file '{path}': {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Digest(#[from] passwd_digest::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("work queue is closed, no more lines can be offered")]
    QueueClosed,

    #[error("bulk insert of {records} records failed: {source}")]
    WriteFailure {
        records: usize,
        #[source]
        source: StoreError,
    },

    #[error("worker cancelled during shutdown, {lost} unflushed records lost")]
    Cancelled { lost: usize },

    #[error("worker task failed: {0}")]
    WorkerTask(String),

    #[error("{remaining} workers did not terminate after cancellation")]
    PoolShutdownTimeout { remaining: usize },

    #[error("run aborted after {failed} worker failures")]
    Aborted { failed: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("surrealdb: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("invalid table name '{0}'")]
    InvalidTable(String),

    #[error("store rejected batch: {0}")]
    Rejected(String),
}
