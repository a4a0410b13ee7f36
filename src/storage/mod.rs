//! Document storage.
//!
//! [`DocumentStore`] is the raw capability: named collections of JSON
//! documents keyed by their `id` field, plus collection-level rename and drop
//! for the refresh job. [`Collection`] layers typed access on top of it.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::schema::data::Document;

pub mod in_memory;
#[cfg(feature = "db")]
pub mod libsql_store;

pub use in_memory::InMemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionName {
    Recipes,
    Details,
    Tags,
}

impl CollectionName {
    /// Refresh order: tags, then recipes, then details.
    pub const ALL: [CollectionName; 3] = [CollectionName::Tags, CollectionName::Recipes, CollectionName::Details];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Recipes => "recipes",
            CollectionName::Details => "details",
            CollectionName::Tags => "tags",
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage trait for the synced collections.
///
/// Collections spring into existence on first insert. Documents are matched
/// on their top-level `id` string.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>>;
    /// All documents, in insertion order.
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>>;
    async fn insert_one(&self, collection: &str, document: Value) -> Result<()>;
    async fn insert_many(&self, collection: &str, documents: Vec<Value>) -> Result<()>;
    /// Replaces the whole document with the given id. Returns false when no
    /// document matched.
    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<bool>;
    /// Returns false when no document matched.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool>;

    async fn list_collections(&self) -> Result<Vec<String>>;
    /// Renames a collection in one step. Fails when `from` is missing or `to`
    /// already exists.
    async fn rename_collection(&self, from: &str, to: &str) -> Result<()>;
    /// Dropping a missing collection is not an error.
    async fn drop_collection(&self, name: &str) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Pulls the `id` field out of a JSON document.
pub fn document_id(document: &Value) -> Result<&str> {
    document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::storage("document has no string `id` field"))
}

/// Typed view of one collection.
pub struct Collection<'a, T> {
    store: &'a dyn DocumentStore,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Document> Collection<'a, T> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    fn name(&self) -> &'static str {
        T::COLLECTION.as_str()
    }

    pub async fn read_one(&self, id: &str) -> Result<Option<T>> {
        match self.store.find_one(self.name(), id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Like [`Self::read_one`], with a missing document turned into
    /// [`SyncError::DocumentNotFound`].
    pub async fn require_one(&self, id: &str) -> Result<T> {
        self.read_one(id).await?.ok_or_else(|| SyncError::DocumentNotFound {
            collection: self.name().to_string(),
            id: id.to_string(),
        })
    }

    pub async fn read_all(&self) -> Result<Vec<T>> {
        self.store
            .find_all(self.name())
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(SyncError::from))
            .collect()
    }

    pub async fn create_one(&self, document: &T) -> Result<()> {
        self.store
            .insert_one(self.name(), serde_json::to_value(document)?)
            .await
    }

    pub async fn create_many(&self, documents: &[T]) -> Result<()> {
        let values = documents
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Inserting {} documents into {}", values.len(), self.name());
        self.store.insert_many(self.name(), values).await
    }

    /// Whole-document replace keyed on the document's own id.
    pub async fn replace_one(&self, document: &T) -> Result<()> {
        let id = document.id();
        let replaced = self
            .store
            .replace_one(self.name(), id, serde_json::to_value(document)?)
            .await?;
        if replaced {
            Ok(())
        } else {
            Err(SyncError::DocumentNotFound {
                collection: self.name().to_string(),
                id: id.to_string(),
            })
        }
    }

    pub async fn delete_one(&self, id: &str) -> Result<bool> {
        self.store.delete_one(self.name(), id).await
    }
}
