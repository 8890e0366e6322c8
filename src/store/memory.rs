//! In-memory DocumentStore
//!
//! Collections are `Vec<Document>` in insertion order behind a
//! `tokio::sync::RwLock`. Update validation happens before any document is
//! looked at, so rejected updates never leave partial writes.

use super::traits::{DocumentStore, FindAndModifyOptions, UpdateOutcome};
use super::update::{apply, matches, plan};
use crate::document::{document_id, Document, DocumentId, Filter, OperationSpec, ID_FIELD};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory implementation of DocumentStore
///
/// ```
/// use mydb_driver::{DocumentStore, MemoryStore};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// let doc = json!({"_id": "a", "n": 1}).as_object().cloned().unwrap();
/// store.insert("users", doc).await.unwrap();
///
/// let filter = json!({"_id": "a"}).as_object().cloned().unwrap();
/// let update = json!({"$inc": {"n": 1}}).as_object().cloned().unwrap();
/// let outcome = store.update("users", &filter, &update).await.unwrap();
/// assert_eq!(outcome.modified, 1);
/// # });
/// ```
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    ///
    /// While unavailable every call fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("memory store is offline".into()))
        }
    }

    /// Shared body of update / findAndModify: returns (before, after) of the
    /// matched document
    async fn modify(
        &self,
        collection: &str,
        filter: &Filter,
        update: &OperationSpec,
    ) -> Result<Option<(Document, Document)>> {
        self.check_available()?;
        let plan = plan(update)?;

        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };

        let mut target = None;
        for (index, doc) in docs.iter().enumerate() {
            if matches(doc, filter)? {
                target = Some(index);
                break;
            }
        }
        let Some(index) = target else {
            return Ok(None);
        };

        let before = docs[index].clone();
        let after = apply(&before, filter, &plan)?;
        docs[index] = after.clone();
        Ok(Some((before, after)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, document: Document) -> Result<Document> {
        self.check_available()?;

        let (id, id_value) = match (document_id(&document), document.get(ID_FIELD)) {
            (Some(id), Some(value)) => (id, value.clone()),
            (None, Some(value)) => {
                return Err(Error::StoreRejected(format!(
                    "unsupported `_id` value {}",
                    value
                )))
            }
            (_, None) => {
                let id = DocumentId::generate();
                let value = id.to_value();
                (id, value)
            }
        };
        // `_id` always leads the stored document, as the caller gave it
        let mut stored = Document::with_capacity(document.len() + 1);
        stored.insert(ID_FIELD.to_string(), id_value);
        for (key, value) in document {
            if key != ID_FIELD {
                stored.insert(key, value);
            }
        }

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| document_id(d).as_ref() == Some(&id)) {
            return Err(Error::StoreRejected(format!(
                "E11000 duplicate key error collection: {} dup key: {{ _id: \"{}\" }}",
                collection, id
            )));
        }
        docs.push(stored.clone());
        debug!(collection = %collection, id = %id, "Document inserted");
        Ok(stored)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        self.check_available()?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(None);
        };
        for doc in docs {
            if matches(doc, filter)? {
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &OperationSpec,
    ) -> Result<UpdateOutcome> {
        Ok(match self.modify(collection, filter, update).await? {
            Some((before, after)) => UpdateOutcome {
                matched: 1,
                modified: u64::from(before != after),
            },
            None => UpdateOutcome::default(),
        })
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        filter: &Filter,
        update: &OperationSpec,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>> {
        Ok(self
            .modify(collection, filter, update)
            .await?
            .map(|(before, after)| if options.return_new { after } else { before }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn obj(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = MemoryStore::new();
        let doc = store.insert("users", obj(json!({"a": 1}))).await.unwrap();
        let id = document_id(&doc).unwrap();
        assert_eq!(doc.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(store.count("users").await, 1);

        let found = store
            .find_one("users", &obj(json!({"_id": id.as_str()})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["a"], json!(1));
    }

    #[tokio::test]
    async fn test_insert_keeps_numeric_id() {
        let store = MemoryStore::new();
        let doc = store
            .insert("users", obj(json!({"a": 1, "_id": 42})))
            .await
            .unwrap();
        assert_eq!(Value::Object(doc), json!({"_id": 42, "a": 1}));

        let found = store
            .find_one("users", &obj(json!({"_id": "42"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["_id"], json!(42));

        let err = store
            .insert("users", obj(json!({"_id": "42"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StoreRejected);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_rejected() {
        let store = MemoryStore::new();
        store.insert("users", obj(json!({"_id": "x"}))).await.unwrap();
        let err = store
            .insert("users", obj(json!({"_id": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StoreRejected);
    }

    #[tokio::test]
    async fn test_update_without_match_is_ok() {
        let store = MemoryStore::new();
        let outcome = store
            .update("users", &obj(json!({"_id": "nope"})), &obj(json!({"$set": {"a": 1}})))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
    }

    #[tokio::test]
    async fn test_update_reports_modified() {
        let store = MemoryStore::new();
        store.insert("users", obj(json!({"_id": "x", "a": 1}))).await.unwrap();

        let filter = obj(json!({"_id": "x"}));
        let outcome = store
            .update("users", &filter, &obj(json!({"$set": {"a": 2}})))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        let outcome = store
            .update("users", &filter, &obj(json!({"$set": {}})))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_document_untouched() {
        let store = MemoryStore::new();
        store
            .insert("users", obj(json!({"_id": "x", "a": [1, 2]})))
            .await
            .unwrap();
        let filter = obj(json!({"_id": "x"}));

        let err = store
            .update(
                "users",
                &filter,
                &obj(json!({"$pull": {"a": 1}, "$push": {"a": 3}})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StoreRejected);

        let doc = store.find_one("users", &filter).await.unwrap().unwrap();
        assert_eq!(doc["a"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_find_and_modify_before_and_after() {
        let store = MemoryStore::new();
        store.insert("users", obj(json!({"_id": "x", "n": 1}))).await.unwrap();
        let filter = obj(json!({"_id": "x"}));
        let inc = obj(json!({"$inc": {"n": 1}}));

        let before = store
            .find_and_modify("users", &filter, &inc, FindAndModifyOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before["n"], json!(1));

        let after = store
            .find_and_modify("users", &filter, &inc, FindAndModifyOptions { return_new: true })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after["n"], json!(3));

        let none = store
            .find_and_modify("other", &filter, &inc, FindAndModifyOptions::default())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = store.insert("users", Document::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StoreUnavailable);

        store.set_available(true);
        assert!(store.insert("users", Document::new()).await.is_ok());
    }
}
