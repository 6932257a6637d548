//! In-memory document store for development and tests

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use crate::core::query::{Sort, SortOrder};
use crate::core::store::{Document, DocumentStore, FindQuery, Transaction, document_id};

type Collections = HashMap<String, Vec<Document>>;

/// In-memory document store
///
/// Collections keep insertion order; the natural (unsorted) read order is the
/// reverse of it, newest first. Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<Collections>>,
    next_transaction: Arc<AtomicU64>,
}

/// Writes staged by an open in-memory transaction
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u64,
    writes: Vec<StagedWrite>,
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Insert {
        collection: String,
        document: Document,
    },
    Replace {
        collection: String,
        id: String,
        document: Document,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl StagedWrite {
    fn collection(&self) -> &str {
        match self {
            StagedWrite::Insert { collection, .. }
            | StagedWrite::Replace { collection, .. }
            | StagedWrite::Delete { collection, .. } => collection,
        }
    }

    /// Apply to `documents`; `Ok(false)` when the target does not exist
    fn apply(&self, documents: &mut Vec<Document>) -> Result<bool> {
        match self {
            StagedWrite::Insert {
                collection,
                document,
            } => {
                let id = document_id(document)
                    .ok_or_else(|| anyhow!("Document inserted into '{}' has no id", collection))?;
                if documents.iter().any(|d| document_id(d) == Some(id)) {
                    return Err(anyhow!(
                        "Duplicate id '{}' in collection '{}'",
                        id,
                        collection
                    ));
                }
                documents.push(document.clone());
                Ok(true)
            }
            StagedWrite::Replace { id, document, .. } => {
                match documents.iter_mut().find(|d| document_id(d) == Some(id)) {
                    Some(existing) => {
                        *existing = document.clone();
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            StagedWrite::Delete { id, .. } => {
                let before = documents.len();
                documents.retain(|d| document_id(d) != Some(id));
                Ok(documents.len() != before)
            }
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents of `collection` as seen from `tx`
    fn view(&self, collection: &str, tx: Option<&Transaction>) -> Result<Vec<Document>> {
        let collections = self
            .collections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let mut documents = collections.get(collection).cloned().unwrap_or_default();
        drop(collections);

        if let Some(tx) = tx {
            for write in memory(tx)?.writes.iter().filter(|w| w.collection() == collection) {
                write.apply(&mut documents)?;
            }
        }
        Ok(documents)
    }

    /// Apply one write, either directly or by staging it on `tx`
    fn write(&self, write: StagedWrite, tx: Option<&mut Transaction>) -> Result<bool> {
        match tx {
            Some(tx) => {
                // validate against the transaction's view before staging
                let mut documents = self.view(write.collection(), Some(&*tx))?;
                let applied = write.apply(&mut documents)?;
                if applied {
                    memory_mut(tx)?.writes.push(write);
                }
                Ok(applied)
            }
            None => {
                let mut collections = self
                    .collections
                    .write()
                    .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
                let documents = collections
                    .entry(write.collection().to_string())
                    .or_default();
                write.apply(documents)
            }
        }
    }
}

fn memory(tx: &Transaction) -> Result<&MemoryTransaction> {
    match tx {
        Transaction::Memory(tx) => Ok(tx),
        #[allow(unreachable_patterns)]
        _ => Err(anyhow!("Transaction does not belong to the in-memory store")),
    }
}

fn memory_mut(tx: &mut Transaction) -> Result<&mut MemoryTransaction> {
    match tx {
        Transaction::Memory(tx) => Ok(tx),
        #[allow(unreachable_patterns)]
        _ => Err(anyhow!("Transaction does not belong to the in-memory store")),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Document,
        tx: Option<&mut Transaction>,
    ) -> Result<u64> {
        let documents = self.view(collection, tx.as_deref())?;
        Ok(documents.iter().filter(|d| matches_filter(d, filter)).count() as u64)
    }

    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
        tx: Option<&mut Transaction>,
    ) -> Result<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .view(collection, tx.as_deref())?
            .into_iter()
            .rev()
            .filter(|d| matches_filter(d, &query.filter))
            .collect();

        if !query.sort.is_empty() {
            // stable: ties keep newest-first order
            documents.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(documents.into_iter().skip(skip).take(limit).collect())
    }

    async fn insert(
        &self,
        collection: &str,
        document: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<()> {
        self.write(
            StagedWrite::Insert {
                collection: collection.to_string(),
                document,
            },
            tx,
        )?;
        Ok(())
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        document: Document,
        tx: Option<&mut Transaction>,
    ) -> Result<bool> {
        self.write(
            StagedWrite::Replace {
                collection: collection.to_string(),
                id: id.to_string(),
                document,
            },
            tx,
        )
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        tx: Option<&mut Transaction>,
    ) -> Result<bool> {
        self.write(
            StagedWrite::Delete {
                collection: collection.to_string(),
                id: id.to_string(),
            },
            tx,
        )
    }

    async fn start_transaction(&self) -> Result<Transaction> {
        let id = self.next_transaction.fetch_add(1, AtomicOrdering::SeqCst);
        tracing::debug!(transaction = id, "started in-memory transaction");
        Ok(Transaction::Memory(MemoryTransaction {
            id,
            writes: Vec::new(),
        }))
    }

    async fn commit(&self, tx: Transaction) -> Result<()> {
        let tx = match tx {
            Transaction::Memory(tx) => tx,
            #[allow(unreachable_patterns)]
            _ => return Err(anyhow!("Transaction does not belong to the in-memory store")),
        };

        let mut collections = self
            .collections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        // apply on copies so a conflicting write leaves the store untouched
        let mut touched: HashMap<String, Vec<Document>> = HashMap::new();
        for write in &tx.writes {
            let documents = touched
                .entry(write.collection().to_string())
                .or_insert_with(|| {
                    collections
                        .get(write.collection())
                        .cloned()
                        .unwrap_or_default()
                });
            write.apply(documents)?;
        }
        collections.extend(touched);

        tracing::debug!(
            transaction = tx.id,
            writes = tx.writes.len(),
            "committed in-memory transaction"
        );
        Ok(())
    }

    async fn abort(&self, tx: Transaction) -> Result<()> {
        let tx = memory(&tx)?;
        tracing::debug!(
            transaction = tx.id,
            discarded = tx.writes.len(),
            "aborted in-memory transaction"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter evaluation
// ---------------------------------------------------------------------------

/// Whether `document` satisfies every condition of `filter`
pub fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, condition)| matches_condition(document.get(field), condition))
}

fn matches_condition(value: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(operators) if operators.keys().all(|k| k.starts_with('$')) => operators
            .iter()
            .all(|(operator, operand)| matches_operator(value, operator, operand)),
        expected => equals_or_contains(value, expected),
    }
}

fn matches_operator(value: Option<&Value>, operator: &str, operand: &Value) -> bool {
    let ordering = || value.and_then(|v| compare_values(v, operand));
    match operator {
        "$eq" => equals_or_contains(value, operand),
        "$ne" => !equals_or_contains(value, operand),
        "$in" => operand
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|c| equals_or_contains(value, c))),
        "$gt" => ordering() == Some(Ordering::Greater),
        "$gte" => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        "$lt" => ordering() == Some(Ordering::Less),
        "$lte" => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        unknown => {
            tracing::warn!(operator = unknown, "unsupported filter operator");
            false
        }
    }
}

/// Equality; an array field matches when one of its elements is equal
fn equals_or_contains(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| same_value(item, expected))
        }
        Some(actual) => same_value(actual, expected),
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two scalars of the same kind
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: missing/null < bool < number < string < rest
fn sort_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_documents(a: &Document, b: &Document, sort: &Sort) -> Ordering {
    for (field, order) in sort.iter() {
        let (x, y) = (a.get(field), b.get(field));
        let ordering = sort_rank(x).cmp(&sort_rank(y)).then_with(|| match (x, y) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        });
        let ordering = match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    fn filter(value: Value) -> Document {
        doc(value)
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (id, title, priority, tags) in [
            ("1", "alpha", 3, json!(["work"])),
            ("2", "beta", 1, json!(["home", "work"])),
            ("3", "gamma", 2, json!([])),
        ] {
            store
                .insert(
                    "todos",
                    doc(json!({"id": id, "title": title, "priority": priority, "tags": tags})),
                    None,
                )
                .await
                .unwrap();
        }
        store
    }

    fn ids(documents: &[Document]) -> Vec<&str> {
        documents.iter().filter_map(document_id).collect()
    }

    #[tokio::test]
    async fn test_natural_order_is_newest_first() {
        let store = seeded().await;
        let all = store.find("todos", &FindQuery::default(), None).await.unwrap();
        assert_eq!(ids(&all), vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_sort_skip_limit() {
        let store = seeded().await;
        let query = FindQuery::default()
            .sort(Sort::new().then("priority", SortOrder::Asc))
            .skip(1)
            .limit(1);
        let page = store.find("todos", &query, None).await.unwrap();
        assert_eq!(ids(&page), vec!["3"]);
    }

    #[tokio::test]
    async fn test_filters() {
        let store = seeded().await;
        let cases = [
            (json!({"title": "beta"}), vec!["2"]),
            (json!({"tags": "work"}), vec!["2", "1"]),
            (json!({"priority": {"$gte": 2}}), vec!["3", "1"]),
            (json!({"priority": {"$lt": 2}}), vec!["2"]),
            (json!({"title": {"$ne": "beta"}}), vec!["3", "1"]),
            (json!({"id": {"$in": ["1", "3", "9"]}}), vec!["3", "1"]),
            (json!({"deleted": {"$ne": true}}), vec!["3", "2", "1"]),
            (json!({"deleted": true}), vec![]),
        ];
        for (f, expected) in cases {
            let found = store
                .find("todos", &FindQuery::new(filter(f.clone())), None)
                .await
                .unwrap();
            assert_eq!(ids(&found), expected, "filter {}", f);
            let count = store.count("todos", &filter(f), None).await.unwrap();
            assert_eq!(count as usize, expected.len());
        }
    }

    #[tokio::test]
    async fn test_replace_and_delete_report_missing() {
        let store = seeded().await;
        assert!(
            store
                .replace("todos", "2", doc(json!({"id": "2", "title": "beta!"})), None)
                .await
                .unwrap()
        );
        assert!(
            !store
                .replace("todos", "9", doc(json!({"id": "9"})), None)
                .await
                .unwrap()
        );
        assert!(store.delete("todos", "1", None).await.unwrap());
        assert!(!store.delete("todos", "1", None).await.unwrap());
        assert_eq!(store.count("todos", &Document::new(), None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = seeded().await;
        let result = store.insert("todos", doc(json!({"id": "1"})), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_transaction_commit_applies_all_writes() {
        let store = seeded().await;
        let mut tx = store.start_transaction().await.unwrap();
        store
            .insert("tags", doc(json!({"id": "t1", "name": "a"})), Some(&mut tx))
            .await
            .unwrap();
        store.delete("todos", "1", Some(&mut tx)).await.unwrap();

        // staged writes are visible inside the transaction only
        assert_eq!(store.count("tags", &Document::new(), Some(&mut tx)).await.unwrap(), 1);
        assert_eq!(store.count("tags", &Document::new(), None).await.unwrap(), 0);
        assert_eq!(store.count("todos", &Document::new(), None).await.unwrap(), 3);

        store.commit(tx).await.unwrap();
        assert_eq!(store.count("tags", &Document::new(), None).await.unwrap(), 1);
        assert_eq!(store.count("todos", &Document::new(), None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_transaction_abort_discards_writes() {
        let store = seeded().await;
        let mut tx = store.start_transaction().await.unwrap();
        store
            .insert("tags", doc(json!({"id": "t1"})), Some(&mut tx))
            .await
            .unwrap();
        store.abort(tx).await.unwrap();
        assert_eq!(store.count("tags", &Document::new(), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conflicting_commit_leaves_store_untouched() {
        let store = seeded().await;
        let mut tx = store.start_transaction().await.unwrap();
        store
            .insert("tags", doc(json!({"id": "t1"})), Some(&mut tx))
            .await
            .unwrap();
        store
            .insert("tags", doc(json!({"id": "t2"})), Some(&mut tx))
            .await
            .unwrap();

        // another writer takes t2 first
        store.insert("tags", doc(json!({"id": "t2"})), None).await.unwrap();

        assert!(store.commit(tx).await.is_err());
        let tags = store.find("tags", &FindQuery::default(), None).await.unwrap();
        assert_eq!(ids(&tags), vec!["t2"]);
    }
}
