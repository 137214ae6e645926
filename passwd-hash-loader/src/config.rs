use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use passwd_digest::Algorithm;

use crate::error::Error;

/// Maximum number of concurrently running workers.
pub const POOL_SIZE: usize = 5;

/// Records per bulk insert.
pub const BATCH_SIZE: usize = 20_000;

/// How long in-flight workers get to finish once the queue is exhausted.
pub const GRACE_PERIOD: Duration = Duration::from_secs(120);

/// How long cancelled workers get to wind down before we give up on them.
pub const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(60);

/// Document field holding the original password line.
pub const TEXT_FIELD: &str = "txt";

/// One configured digest: which algorithm to run and which document field
/// receives its hex output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestField {
    pub algorithm: Algorithm,
    pub field: Arc<str>,
}

impl DigestField {
    /// Uses the algorithm's canonical name (`SHA256`, ...) as the field name.
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm, field: Arc::from(algorithm.name()) }
    }

    pub fn with_field(algorithm: Algorithm, field: &str) -> Self {
        Self { algorithm, field: Arc::from(field) }
    }
}

impl FromStr for DigestField {
    type Err = Error;

    /// Parses `ALG` or `ALG=FIELD`, e.g. `sha256` or `sha-512=hash`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((alg, field)) => {
                let field = field.trim();
                if field.is_empty() {
                    return Err(Error::InvalidConfig(format!("empty field name in '{s}'")));
                }
                Ok(Self::with_field(alg.trim().parse()?, field))
            }
            None => Ok(Self::new(s.trim().parse()?)),
        }
    }
}

/// What the scheduler does when a worker run fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and keep dispatching. Records of the failed batch are
    /// lost but the run still completes successfully.
    #[default]
    Continue,
    /// Stop dispatching, cancel in-flight workers and fail the run.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(Error::InvalidConfig(format!(
                "unknown failure policy '{other}' (expected 'continue' or 'abort')"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Continue => f.write_str("continue"),
            FailurePolicy::Abort => f.write_str("abort"),
        }
    }
}

/// Operational parameters of the hashing pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fields: Vec<DigestField>,
    pub pool_size: usize,
    pub batch_size: usize,
    pub grace_period: Duration,
    pub cancel_grace_period: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fields: vec![DigestField::new(Algorithm::Sha512)],
            pool_size: POOL_SIZE,
            batch_size: BATCH_SIZE,
            grace_period: GRACE_PERIOD,
            cancel_grace_period: CANCEL_GRACE_PERIOD,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.fields.is_empty() {
            return Err(Error::InvalidConfig("at least one digest algorithm is required".into()));
        }
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool size must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least 1".into()));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for f in &self.fields {
            if &*f.field == TEXT_FIELD {
                return Err(Error::InvalidConfig(format!(
                    "field '{TEXT_FIELD}' is reserved for the password text"
                )));
            }
            if !seen.insert(&*f.field) {
                return Err(Error::InvalidConfig(format!("duplicate output field '{}'", f.field)));
            }
        }

        Ok(())
    }
}
