//! In-memory reference implementation of [`VersionedStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_conflict;
use crate::store::{VersionedDocument, VersionedStore};

type Collections = HashMap<String, HashMap<String, VersionedDocument>>;

/// In-memory store. Every method holds the single mutex for its whole
/// read-modify-write, which gives the serializable-transaction semantics
/// `cas_save` requires.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn path(collection: &str, id: &str) -> String {
        format!("{}/{}", collection, id)
    }
}

#[async_trait]
impl VersionedStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<VersionedDocument>> {
        let guard = self.inner.lock().await;
        Ok(guard
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> StoreResult<u64> {
        let mut guard = self.inner.lock().await;
        let coll = guard.entry(collection.to_string()).or_default();
        if coll.contains_key(id) {
            return Err(StoreError::already_exists(Self::path(collection, id)));
        }
        coll.insert(
            id.to_string(),
            VersionedDocument {
                id: id.to_string(),
                version: 1,
                data,
            },
        );
        Ok(1)
    }

    async fn cas_save(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        data: Value,
    ) -> StoreResult<u64> {
        let mut guard = self.inner.lock().await;
        let doc = guard
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::not_found(Self::path(collection, id)))?;

        if doc.version != expected_version {
            record_conflict(collection);
            return Err(StoreError::VersionMismatch {
                expected: expected_version,
                actual: doc.version,
            });
        }

        doc.version = expected_version + 1;
        doc.data = data;
        Ok(doc.version)
    }

    async fn save(&self, collection: &str, id: &str, data: Value) -> StoreResult<u64> {
        let mut guard = self.inner.lock().await;
        let coll = guard.entry(collection.to_string()).or_default();
        let doc = coll.entry(id.to_string()).or_insert_with(|| VersionedDocument {
            id: id.to_string(),
            version: 0,
            data: Value::Null,
        });
        doc.version += 1;
        doc.data = data;
        Ok(doc.version)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut guard = self.inner.lock().await;
        if let Some(coll) = guard.get_mut(collection) {
            coll.remove(id);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<VersionedDocument>> {
        let guard = self.inner.lock().await;
        Ok(guard
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }
}
