//! Generic paginated repository
//!
//! A [`Repository<T>`] reads and writes one collection of a
//! [`DocumentStore`], converting documents to and from the entity type `T`.
//!
//! Every operation takes an optional [`Transaction`]. Without one, each write
//! is committed on its own; with one, nothing is visible to other callers
//! until the transaction commits.
//!
//! Missing entities are not errors: lookups, updates and deletes return
//! `Ok(None)`.

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::{AppError, StorageError};
use super::query::{PageResult, PaginationOptions, total_pages};
use super::store::{Document, DocumentStore, FindQuery, ID_FIELD, Transaction, document_id};

/// Field stamped with the creation time
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Field stamped with the last modification time
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A type stored in its own collection
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection holding entities of this type
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// Data access for one entity type
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// The underlying store, to open transactions
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// One page of the entities matching `options.filter`
    ///
    /// A page past the end is empty but still reports the true totals, and
    /// the data query is skipped for it.
    pub async fn find_with_pagination(
        &self,
        options: &PaginationOptions,
        mut tx: Option<&mut Transaction>,
    ) -> Result<PageResult<T>, AppError> {
        let total_items = self
            .store
            .count(T::COLLECTION, &options.filter, tx.as_deref_mut())
            .await?;

        if options.page > total_pages(total_items, options.page_size) {
            return Ok(PageResult::new(Vec::new(), total_items, options));
        }

        let query = FindQuery::new(options.filter.clone())
            .sort(options.sort.clone())
            .skip(options.skip())
            .limit(options.page_size);
        let data = self.find(&query, tx).await?;
        Ok(PageResult::new(data, total_items, options))
    }

    pub async fn find(
        &self,
        query: &FindQuery,
        tx: Option<&mut Transaction>,
    ) -> Result<Vec<T>, AppError> {
        let documents = self.store.find(T::COLLECTION, query, tx).await?;
        documents.into_iter().map(decode).collect()
    }

    pub async fn find_one(
        &self,
        filter: &Document,
        tx: Option<&mut Transaction>,
    ) -> Result<Option<T>, AppError> {
        self.find_one_document(filter, tx)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn find_by_id(
        &self,
        id: &str,
        tx: Option<&mut Transaction>,
    ) -> Result<Option<T>, AppError> {
        self.find_one(&super::store::id_filter(id), tx).await
    }

    pub async fn count(
        &self,
        filter: &Document,
        tx: Option<&mut Transaction>,
    ) -> Result<u64, AppError> {
        Ok(self.store.count(T::COLLECTION, filter, tx).await?)
    }

    /// Insert a partial entity and return what was stored
    ///
    /// An `id` is generated unless the input carries one. `createdAt` and
    /// `updatedAt` are stamped. Fields missing from the input take the
    /// entity's defaults; an input that cannot form a `T` is a validation
    /// error.
    pub async fn create(
        &self,
        mut input: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<T, AppError> {
        if document_id(&input).is_none_or(str::is_empty) {
            input.insert(
                ID_FIELD.to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
        let now = Value::String(Utc::now().to_rfc3339());
        input.insert(CREATED_AT_FIELD.to_string(), now.clone());
        input.insert(UPDATED_AT_FIELD.to_string(), now);

        let entity: T = shape(input)?;
        self.store
            .insert(T::COLLECTION, encode(&entity)?, tx)
            .await?;

        tracing::debug!(collection = T::COLLECTION, id = entity.id(), "created entity");
        Ok(entity)
    }

    /// Insert several partial entities, in order
    pub async fn create_many(
        &self,
        inputs: Vec<Document>,
        mut tx: Option<&mut Transaction>,
    ) -> Result<Vec<T>, AppError> {
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(self.create(input, tx.as_deref_mut()).await?);
        }
        Ok(created)
    }

    /// Apply `patch` to the first entity matching `filter`
    ///
    /// Only the fields present in `patch` change; `id` and `createdAt` are
    /// never overwritten. Returns `None` when nothing matches.
    pub async fn update_one(
        &self,
        filter: &Document,
        patch: Document,
        mut tx: Option<&mut Transaction>,
    ) -> Result<Option<T>, AppError> {
        let Some(mut document) = self.find_one_document(filter, tx.as_deref_mut()).await? else {
            return Ok(None);
        };
        let id = document_id(&document)
            .map(str::to_string)
            .ok_or_else(|| corrupted::<T>("stored document has no id"))?;

        for (field, value) in patch {
            if field == ID_FIELD || field == CREATED_AT_FIELD {
                continue;
            }
            document.insert(field, value);
        }
        document.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let entity: T = shape(document)?;
        let replaced = self
            .store
            .replace(T::COLLECTION, &id, encode(&entity)?, tx)
            .await?;
        if !replaced {
            return Ok(None);
        }

        tracing::debug!(collection = T::COLLECTION, id = %id, "updated entity");
        Ok(Some(entity))
    }

    /// Remove the first entity matching `filter` and return it
    pub async fn delete_one(
        &self,
        filter: &Document,
        mut tx: Option<&mut Transaction>,
    ) -> Result<Option<T>, AppError> {
        let Some(document) = self.find_one_document(filter, tx.as_deref_mut()).await? else {
            return Ok(None);
        };
        let entity: T = decode(document)?;
        let deleted = self.store.delete(T::COLLECTION, entity.id(), tx).await?;
        if !deleted {
            return Ok(None);
        }

        tracing::debug!(collection = T::COLLECTION, id = entity.id(), "deleted entity");
        Ok(Some(entity))
    }

    async fn find_one_document(
        &self,
        filter: &Document,
        tx: Option<&mut Transaction>,
    ) -> Result<Option<Document>, AppError> {
        let query = FindQuery::new(filter.clone()).limit(1);
        let mut documents = self.store.find(T::COLLECTION, &query, tx).await?;
        Ok(documents.pop())
    }
}

fn corrupted<T: Entity>(message: impl std::fmt::Display) -> AppError {
    StorageError::Corrupted {
        collection: T::COLLECTION.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Stored document -> entity; a mismatch is a storage fault
fn decode<T: Entity>(document: Document) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(document)).map_err(corrupted::<T>)
}

/// Client-supplied document -> entity; a mismatch is the client's fault
fn shape<T: Entity>(document: Document) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| AppError::validation(e.to_string()))
}

/// Serialize an entity into a document
pub fn encode<T: Serialize>(entity: &T) -> Result<Document, AppError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(AppError::internal("entity did not serialize to an object")),
        Err(e) => Err(AppError::internal(format!("failed to serialize entity: {}", e))),
    }
}
