use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use passwd_hash_loader::config::{
    BATCH_SIZE, CANCEL_GRACE_PERIOD, GRACE_PERIOD, POOL_SIZE,
};
use passwd_hash_loader::{
    BulkWriter, DigestField, Error, FailurePolicy, PipelineConfig, StoreConfig, SubmissionScheduler,
    SurrealStore, WorkQueue, load_file,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "passwd-hash-loader")]
#[command(about = "Hash a password list and bulk-load the digests into SurrealDB")]
struct Args {
    /// Password list, one entry per line
    input: PathBuf,

    /// Digest to compute, as ALG or ALG=FIELD (md5, sha1, sha256, sha384, sha512)
    #[arg(short, long = "algorithm", value_delimiter = ',', default_value = "sha512")]
    algorithms: Vec<DigestField>,

    /// Maximum number of concurrent workers
    #[arg(short = 'j', long, default_value_t = POOL_SIZE)]
    pool_size: usize,

    /// Documents per bulk insert
    #[arg(long, default_value_t = BATCH_SIZE)]
    batch_size: usize,

    /// Seconds in-flight workers get to finish once the input is drained
    #[arg(long, default_value_t = GRACE_PERIOD.as_secs())]
    grace_period_secs: u64,

    /// Seconds cancelled workers get to wind down
    #[arg(long, default_value_t = CANCEL_GRACE_PERIOD.as_secs())]
    cancel_grace_secs: u64,

    /// What to do when a worker fails: continue or abort
    #[arg(long, default_value_t = FailurePolicy::Continue)]
    on_worker_failure: FailurePolicy,

    /// SurrealDB endpoint (mem:// for an embedded in-memory database)
    #[arg(long, default_value = "ws://127.0.0.1:8000")]
    db_address: String,

    /// Root user to sign in with
    #[arg(long, requires = "db_password")]
    db_username: Option<String>,

    /// Root password to sign in with
    #[arg(long, requires = "db_username")]
    db_password: Option<String>,

    #[arg(long, default_value = "password")]
    db_namespace: String,

    #[arg(long, default_value = "password")]
    db_database: String,

    /// Table receiving the documents
    #[arg(long, default_value = "password_docs")]
    table: String,

    /// Disable progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = PipelineConfig {
        fields: args.algorithms.clone(),
        pool_size: args.pool_size,
        batch_size: args.batch_size,
        grace_period: Duration::from_secs(args.grace_period_secs),
        cancel_grace_period: Duration::from_secs(args.cancel_grace_secs),
        failure_policy: args.on_worker_failure,
    };
    config.validate()?;

    let queue = Arc::new(WorkQueue::new());
    let total = match load_file(&args.input, &queue).await {
        Ok(total) => total,
        Err(e) => {
            error!(error = %e, "input file containing password list could not be read");
            return Err(e);
        }
    };

    let store_config = StoreConfig {
        address: args.db_address.clone(),
        username: args.db_username.clone(),
        password: args.db_password.clone(),
        namespace: args.db_namespace.clone(),
        database: args.db_database.clone(),
        table: args.table.clone(),
    };
    let store = Arc::new(SurrealStore::connect(&store_config).await?);
    let writer = Arc::new(BulkWriter::new(store));

    let progress = (!args.no_progress).then(|| {
        let bar = stored_documents_bar(total);
        let task = track_bulk_inserts(bar.clone(), Arc::clone(&writer));
        (bar, task)
    });

    let scheduler = SubmissionScheduler::new(&config, queue, Arc::clone(&writer))?;
    let result = scheduler.run_to_completion().await;

    if let Some((bar, task)) = progress {
        task.abort();
        bar.set_position(writer.records_written());
        bar.finish_with_message(batches_message(&writer));
    }

    let report = result?;

    if report.failed_workers > 0 || report.cancelled_workers > 0 {
        warn!(
            failed = report.failed_workers,
            cancelled = report.cancelled_workers,
            lost = report.lost_records,
            "some workers did not finish cleanly, documents were lost"
        );
    }
    if report.unterminated_workers > 0 {
        error!(remaining = report.unterminated_workers, "pool did not terminate");
    }

    info!(
        lines = report.lines_dispatched,
        documents = report.records_written,
        table = %store_config.table,
        "load complete in {:.1}s",
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

/// One tick per stored document; the message counts bulk inserts.
fn stored_documents_bar(lines: usize) -> ProgressBar {
    let style = ProgressStyle::with_template("[{elapsed}] {wide_bar} {pos}/{len} documents, {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(lines as u64).with_style(style)
}

fn track_bulk_inserts(bar: ProgressBar, writer: Arc<BulkWriter<SurrealStore>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut refresh = tokio::time::interval(Duration::from_millis(250));
        loop {
            refresh.tick().await;
            bar.set_position(writer.records_written());
            bar.set_message(batches_message(&writer));
        }
    })
}

fn batches_message(writer: &BulkWriter<SurrealStore>) -> String {
    format!("{} bulk inserts", writer.batches_written())
}
