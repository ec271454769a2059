//! The compare-and-swap persistence interface.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// A stored document together with its authoritative version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    /// Document ID within its collection
    pub id: String,
    /// Version owned by the store; starts at 1 on creation
    pub version: u64,
    /// Document body
    pub data: Value,
}

/// Generic versioned document store.
///
/// Implementations must make each method atomic with respect to concurrent
/// callers on the same document: `cas_save` in particular performs its
/// read-compare-write as a single transaction. The integer version is owned
/// by the store and increments by exactly 1 per successful write.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Fetch a document, or `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<VersionedDocument>>;

    /// Create a document at version 1. Fails with `AlreadyExists` if present.
    async fn create(&self, collection: &str, id: &str, data: Value) -> StoreResult<u64>;

    /// Write only if the stored version equals `expected_version`; returns
    /// the new version (`expected_version + 1`). Fails with
    /// `VersionMismatch` (carrying both versions) otherwise, or `NotFound`
    /// if the document does not exist.
    async fn cas_save(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        data: Value,
    ) -> StoreResult<u64>;

    /// Unconditional increment-on-write; creates the document at version 1
    /// if absent. Returns the new version.
    async fn save(&self, collection: &str, id: &str, data: Value) -> StoreResult<u64>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// List all documents in a collection.
    async fn list(&self, collection: &str) -> StoreResult<Vec<VersionedDocument>>;
}
