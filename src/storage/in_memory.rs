use super::{document_id, DocumentStore};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Collections = BTreeMap<String, Vec<Value>>;

fn duplicate_id(collection: &str, id: &str) -> SyncError {
    SyncError::storage(format!("document {id} already exists in {collection}"))
}

/// In-memory storage implementation for development/testing
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<Mutex<Collections>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| SyncError::storage("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| document_id(d).ok() == Some(id)))
            .cloned())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self.lock()?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        self.insert_many(collection, vec![document]).await
    }

    /// All or nothing: an id already stored, or repeated within the batch,
    /// rejects the whole batch.
    async fn insert_many(&self, collection: &str, documents: Vec<Value>) -> Result<()> {
        let mut collections = self.lock()?;
        {
            let mut seen: HashSet<&str> = collections
                .get(collection)
                .into_iter()
                .flatten()
                .filter_map(|d| document_id(d).ok())
                .collect();
            for doc in &documents {
                let id = document_id(doc)?;
                if !seen.insert(id) {
                    return Err(duplicate_id(collection, id));
                }
            }
        }

        let count = documents.len();
        collections.entry(collection.to_string()).or_default().extend(documents);
        debug!("Inserted {} documents into {}", count, collection);
        Ok(())
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<bool> {
        let mut collections = self.lock()?;
        let slot = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| document_id(d).ok() == Some(id)));
        match slot {
            Some(existing) => {
                *existing = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.lock()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| document_id(d).ok() == Some(id)) {
            Some(index) => {
                docs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        let mut collections = self.lock()?;
        if collections.contains_key(to) {
            return Err(SyncError::storage(format!("target collection {to} already exists")));
        }
        let docs = collections
            .remove(from)
            .ok_or_else(|| SyncError::storage(format!("collection {from} does not exist")))?;
        collections.insert(to.to_string(), docs);
        debug!("Renamed collection {} to {}", from, to);
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}
