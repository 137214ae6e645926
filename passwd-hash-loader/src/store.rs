use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::StoreError;
use crate::record::HashRecord;

/// Destination of the hashed documents.
///
/// `insert_many` receives one whole batch and must persist it in a single
/// bulk call. Callers never issue two inserts at once.
pub trait DocumentStore: Send + Sync + 'static {
    fn insert_many(
        &self,
        records: Vec<HashRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Connection settings for [`SurrealStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint such as `ws://127.0.0.1:8000`, or `mem://` for an embedded
    /// in-memory database.
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub namespace: String,
    pub database: String,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: "ws://127.0.0.1:8000".to_string(),
            username: None,
            password: None,
            namespace: "password".to_string(),
            database: "password".to_string(),
            table: "password_docs".to_string(),
        }
    }
}

/// SurrealDB-backed document store. The connection is opened once and shared
/// by every worker.
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
    table: String,
}

impl SurrealStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        validate_table(&config.table)?;

        let db = connect(config.address.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root { username: username.as_str(), password: password.as_str() })
                .await?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        info!(
            address = %config.address,
            namespace = %config.namespace,
            database = %config.database,
            table = %config.table,
            "connected to document store"
        );

        Ok(Self { db, table: config.table.clone() })
    }

    /// Number of documents currently stored in the table.
    pub async fn count(&self) -> Result<usize, StoreError> {
        let mut response = self
            .db
            .query(format!("SELECT count() AS count FROM {} GROUP ALL", self.table))
            .await?
            .check()?;
        let count: Option<usize> = response.take((0, "count"))?;
        Ok(count.unwrap_or(0))
    }

    /// Looks up the value of `field` in the document whose `txt` equals `text`.
    pub async fn field_for_text(
        &self,
        text: &str,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut response = self
            .db
            .query(format!("SELECT * FROM {} WHERE txt = $txt", self.table))
            .bind(("txt", text.to_string()))
            .await?
            .check()?;
        Ok(response.take((0, field))?)
    }
}

impl DocumentStore for SurrealStore {
    async fn insert_many(&self, records: Vec<HashRecord>) -> Result<(), StoreError> {
        self.db
            .query(format!("INSERT INTO {} $docs RETURN NONE", self.table))
            .bind(("docs", records))
            .await?
            .check()?;
        Ok(())
    }
}

/// Table names are interpolated into queries, so only plain identifiers pass.
fn validate_table(table: &str) -> Result<(), StoreError> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid { Ok(()) } else { Err(StoreError::InvalidTable(table.to_string())) }
}
