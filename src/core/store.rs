//! Document store abstraction
//!
//! Repositories talk to a [`DocumentStore`]: a set of named collections of
//! JSON documents, each keyed by its `id` field. Writes can be grouped in a
//! [`Transaction`] that is committed or aborted as a whole.
//!
//! Filters are JSON objects. A plain value means equality (an array field
//! matches when it contains the value); an object of operators supports
//! `$eq`, `$ne`, `$in`, `$gt`, `$gte`, `$lt` and `$lte`.
//!
//! ```json
//! { "creatorUserId": "alice", "deleted": { "$ne": true }, "tags": "tag-1" }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::AppError;
use super::query::Sort;
use crate::storage::in_memory::MemoryTransaction;

/// A stored document
pub type Document = Map<String, Value>;

/// Field holding a document's identity
pub const ID_FIELD: &str = "id";

/// A `find` request
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: Document,
    /// Empty means the backend's natural order, newest first
    pub sort: Sort,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Handle on an open transaction
///
/// Passed explicitly down the call chain; every write made with it becomes
/// visible together on commit or not at all.
pub enum Transaction {
    Memory(MemoryTransaction),
    #[cfg(feature = "mongodb_backend")]
    Mongo(Box<mongodb::ClientSession>),
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transaction::Memory(tx) => f.debug_tuple("Memory").field(tx).finish(),
            #[cfg(feature = "mongodb_backend")]
            Transaction::Mongo(_) => f.write_str("Mongo(..)"),
        }
    }
}

/// Backend-agnostic collection store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs
    fn backend(&self) -> &'static str;

    /// Establish the connection; idempotent
    async fn connect(&self) -> Result<()>;

    /// Number of documents matching `filter`
    async fn count(
        &self,
        collection: &str,
        filter: &Document,
        tx: Option<&mut Transaction>,
    ) -> Result<u64>;

    /// Documents matching `query`, in order
    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
        tx: Option<&mut Transaction>,
    ) -> Result<Vec<Document>>;

    /// Insert a document; its `id` must be set and unused
    async fn insert(
        &self,
        collection: &str,
        document: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<()>;

    /// Replace the document with id `id`; `false` if there is none
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        document: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<bool>;

    /// Remove the document with id `id`; `false` if there is none
    async fn delete(&self, collection: &str, id: &str, tx: Option<&mut Transaction>)
    -> Result<bool>;

    async fn start_transaction(&self) -> Result<Transaction>;

    async fn commit(&self, tx: Transaction) -> Result<()>;

    async fn abort(&self, tx: Transaction) -> Result<()>;
}

/// Commit `tx` when `result` is a success, abort it otherwise
///
/// ```rust,ignore
/// let mut tx = store.start_transaction().await?;
/// let result = create_with_tags(&mut tx, input).await;
/// let todo = finish_transaction(store.as_ref(), tx, result).await?;
/// ```
pub async fn finish_transaction<T>(
    store: &dyn DocumentStore,
    tx: Transaction,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            store.commit(tx).await.map_err(|e| -> AppError {
                super::error::StorageError::Transaction {
                    message: format!("{:#}", e),
                }
                .into()
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = store.abort(tx).await {
                tracing::warn!(error = %abort_err, "failed to abort transaction");
            }
            Err(err)
        }
    }
}

/// `{ "id": id }`
pub fn id_filter(id: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    filter
}

/// The `id` of a stored document
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}
