use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

use super::{is_valid_document_id, sort_snapshot};
use crate::storage::traits::{Collection, Document, RemoteStore, Snapshot};

#[derive(Default)]
struct MemoryInner {
    collections: HashMap<Collection, BTreeMap<String, Value>>,
    watchers: HashMap<Collection, watch::Sender<Snapshot>>,
}

impl MemoryInner {
    fn snapshot(&self, collection: Collection) -> Snapshot {
        let mut documents: Snapshot = self
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        sort_snapshot(collection, &mut documents);
        documents
    }

    fn publish(&self, collection: Collection) {
        if let Some(sender) = self.watchers.get(&collection) {
            sender.send_replace(self.snapshot(collection));
        }
    }
}

/// Document store held in process memory
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored in `collection`
    pub fn document_count(&self, collection: Collection) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.collections.get(&collection).map_or(0, |docs| docs.len())
    }
}

#[async_trait]
impl RemoteStore for MemoryDocumentStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn set_document(&self, collection: Collection, id: &str, data: Value) -> Result<()> {
        if !is_valid_document_id(id) {
            return Err(anyhow!("Invalid document id: {:?}", id));
        }

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(id.to_string(), data);
        inner.publish(collection);

        debug!("Stored document {}/{}", collection, id);
        Ok(())
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            inner.publish(collection);
            debug!("Deleted document {}/{}", collection, id);
        }
        Ok(())
    }

    async fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn list_documents(&self, collection: Collection) -> Result<Snapshot> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.snapshot(collection))
    }

    async fn subscribe(&self, collection: Collection) -> Result<watch::Receiver<Snapshot>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = inner.snapshot(collection);
        let sender = inner
            .watchers
            .entry(collection)
            .or_insert_with(|| watch::channel(Vec::new()).0);
        sender.send_replace(snapshot);
        Ok(sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::Group;

    #[tokio::test]
    async fn test_set_replaces_whole_document() {
        let store = MemoryDocumentStore::new();
        let collection = Collection::Attendance(2024);

        store
            .set_document(collection, "children_2024-03-10", json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        store
            .set_document(collection, "children_2024-03-10", json!({"a": 3}))
            .await
            .unwrap();

        let doc = store.get_document(collection, "children_2024-03-10").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"a": 3}));
        assert_eq!(store.document_count(collection), 1);
    }

    #[tokio::test]
    async fn test_subscription_receives_full_snapshots() {
        let store = MemoryDocumentStore::new();
        let collection = Collection::Students(Group::Teens);
        store.set_document(collection, "s1", json!({"name": "Valentina"})).await.unwrap();

        let mut rx = store.subscribe(collection).await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.set_document(collection, "s2", json!({"name": "Camilo"})).await.unwrap();
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "s2");

        store.delete_document(collection, "s1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_ids() {
        let store = MemoryDocumentStore::new();
        let result = store
            .set_document(Collection::Attendance(2024), "../x", json!({}))
            .await;
        assert!(result.is_err());
    }
}
