//! Versioned session persistence with optimistic concurrency.
//!
//! The document store itself is abstracted behind [`VersionedStore`], a
//! compare-and-swap interface any transactional backend can implement.
//! [`MemoryStore`] provides the reference implementation; [`SessionStore`]
//! is the typed layer the engine talks to.

pub mod error;
pub mod memory;
pub mod metrics;
pub mod migrate;
pub mod session_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use migrate::{migrate_session, SESSION_SCHEMA_VERSION};
pub use session_store::SessionStore;
pub use store::{VersionedDocument, VersionedStore};
