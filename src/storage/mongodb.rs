//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! ctrlkit = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Each repository collection maps to a MongoDB collection of the same name.
//! Documents travel as `serde_json` objects and are converted to BSON at this
//! boundary. The `id` field is mapped to MongoDB's `_id` convention, in
//! documents, filters and sort keys alike.
//!
//! Transactions use client sessions and require a replica set or sharded
//! cluster, as with any MongoDB multi-document transaction.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document as BsonDocument, doc};
use mongodb::{Client, ClientSession, Database};

use super::connection::LazyConnection;
use crate::core::query::{Sort, SortOrder};
use crate::core::store::{Document, DocumentStore, FindQuery, ID_FIELD, Transaction};

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a JSON object into a BSON document, renaming `id` → `_id`.
fn to_bson_document(json: &Document) -> Result<BsonDocument> {
    let bson = mongodb::bson::to_bson(json)
        .map_err(|e| anyhow!("Failed to convert JSON to BSON: {}", e))?;

    let mut document = match bson {
        Bson::Document(d) => d,
        _ => return Err(anyhow!("Expected BSON document, got non-object")),
    };

    if let Some(id) = document.remove(ID_FIELD) {
        document.insert("_id", id);
    }
    Ok(document)
}

/// Convert a BSON document back into a JSON object, renaming `_id` → `id`.
fn from_bson_document(mut document: BsonDocument) -> Result<Document> {
    if let Some(id) = document.remove("_id") {
        document.insert(ID_FIELD, id);
    }
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(anyhow!("Expected a JSON object from BSON document")),
    }
}

/// Sort specification; natural order is newest first
///
/// Ties under an explicit sort fall back to the natural order, so pages
/// stay stable between calls.
fn to_bson_sort(sort: &Sort) -> BsonDocument {
    let mut spec = BsonDocument::new();
    for (field, order) in sort.iter() {
        let field = if field == ID_FIELD { "_id" } else { field };
        let direction = match order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        spec.insert(field, direction);
    }
    for tie_breaker in ["createdAt", "_id"] {
        if !spec.contains_key(tie_breaker) {
            spec.insert(tie_breaker, -1);
        }
    }
    spec
}

fn session(tx: Option<&mut Transaction>) -> Result<Option<&mut ClientSession>> {
    match tx {
        None => Ok(None),
        Some(Transaction::Mongo(session)) => Ok(Some(session.as_mut())),
        Some(_) => Err(anyhow!("Transaction does not belong to the MongoDB store")),
    }
}

// ---------------------------------------------------------------------------
// MongoStore
// ---------------------------------------------------------------------------

/// Document store backed by MongoDB.
///
/// The client is created on the first call to [`connect`](DocumentStore::connect)
/// (or the first operation) and shared afterwards.
///
/// # Example
///
/// ```rust,ignore
/// let store = MongoStore::new("mongodb://localhost:27017", "todos");
/// store.connect().await?;
/// ```
pub struct MongoStore {
    uri: String,
    database_name: String,
    database: LazyConnection<Database>,
}

impl MongoStore {
    pub fn new(uri: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database_name: database_name.into(),
            database: LazyConnection::new(),
        }
    }

    async fn database(&self) -> Result<&Database> {
        self.database
            .get_or_connect(|| async {
                tracing::info!(database = %self.database_name, "connecting to MongoDB");
                let client = Client::with_uri_str(&self.uri)
                    .await
                    .map_err(|e| anyhow!("Failed to connect to MongoDB: {}", e))?;
                let database = client.database(&self.database_name);
                database
                    .run_command(doc! { "ping": 1 })
                    .await
                    .map_err(|e| anyhow!("MongoDB ping failed: {}", e))?;
                Ok(database)
            })
            .await
    }

    async fn collection(&self, name: &str) -> Result<mongodb::Collection<BsonDocument>> {
        Ok(self.database().await?.collection(name))
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn connect(&self) -> Result<()> {
        self.database().await.map(|_| ())
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Document,
        tx: Option<&mut Transaction>,
    ) -> Result<u64> {
        let collection = self.collection(collection).await?;
        let filter = to_bson_document(filter)?;
        let count = match session(tx)? {
            Some(session) => collection.count_documents(filter).session(session).await,
            None => collection.count_documents(filter).await,
        };
        count.map_err(|e| anyhow!("Failed to count documents: {}", e))
    }

    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
        tx: Option<&mut Transaction>,
    ) -> Result<Vec<Document>> {
        let collection = self.collection(collection).await?;
        let filter = to_bson_document(&query.filter)?;
        let mut find = collection
            .find(filter)
            .sort(to_bson_sort(&query.sort))
            .skip(query.skip);
        if let Some(limit) = query.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let documents: Vec<BsonDocument> = match session(tx)? {
            Some(session) => {
                let mut cursor = find
                    .session(&mut *session)
                    .await
                    .map_err(|e| anyhow!("Failed to query documents: {}", e))?;
                cursor
                    .stream(session)
                    .try_collect()
                    .await
                    .map_err(|e| anyhow!("Failed to collect documents: {}", e))?
            }
            None => find
                .await
                .map_err(|e| anyhow!("Failed to query documents: {}", e))?
                .try_collect()
                .await
                .map_err(|e| anyhow!("Failed to collect documents: {}", e))?,
        };

        documents.into_iter().map(from_bson_document).collect()
    }

    async fn insert(
        &self,
        collection: &str,
        document: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<()> {
        let collection = self.collection(collection).await?;
        let document = to_bson_document(&document)?;
        let result = match session(tx)? {
            Some(session) => collection.insert_one(document).session(session).await,
            None => collection.insert_one(document).await,
        };
        result.map_err(|e| anyhow!("Failed to insert document: {}", e))?;
        Ok(())
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        document: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<bool> {
        let collection = self.collection(collection).await?;
        let document = to_bson_document(&document)?;
        let filter = doc! { "_id": id };
        let result = match session(tx)? {
            Some(session) => collection.replace_one(filter, document).session(session).await,
            None => collection.replace_one(filter, document).await,
        };
        let result = result.map_err(|e| anyhow!("Failed to replace document: {}", e))?;
        Ok(result.matched_count > 0)
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        tx: Option<&mut Transaction>,
    ) -> Result<bool> {
        let collection = self.collection(collection).await?;
        let filter = doc! { "_id": id };
        let result = match session(tx)? {
            Some(session) => collection.delete_one(filter).session(session).await,
            None => collection.delete_one(filter).await,
        };
        let result = result.map_err(|e| anyhow!("Failed to delete document: {}", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn start_transaction(&self) -> Result<Transaction> {
        let client = self.database().await?.client();
        let mut session = client
            .start_session()
            .await
            .map_err(|e| anyhow!("Failed to start session: {}", e))?;
        session
            .start_transaction()
            .await
            .map_err(|e| anyhow!("Failed to start transaction: {}", e))?;
        Ok(Transaction::Mongo(Box::new(session)))
    }

    async fn commit(&self, tx: Transaction) -> Result<()> {
        match tx {
            Transaction::Mongo(mut session) => session
                .commit_transaction()
                .await
                .map_err(|e| anyhow!("Failed to commit transaction: {}", e)),
            _ => Err(anyhow!("Transaction does not belong to the MongoDB store")),
        }
    }

    async fn abort(&self, tx: Transaction) -> Result<()> {
        match tx {
            Transaction::Mongo(mut session) => session
                .abort_transaction()
                .await
                .map_err(|e| anyhow!("Failed to abort transaction: {}", e)),
            _ => Err(anyhow!("Transaction does not belong to the MongoDB store")),
        }
    }
}
