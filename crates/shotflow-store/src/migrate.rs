//! Schema-versioned (de)serialization of session documents.
//!
//! Persisted documents carry an explicit `schema_version`; reads go through
//! [`migrate_session`], which rejects versions it does not know how to read
//! instead of passing unknown shapes through.

use serde_json::Value;

use shotflow_models::Session;

use crate::error::{StoreError, StoreResult};

/// Current session document schema version.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Wrap a session for persistence, stamping the current schema version.
pub fn session_to_document(session: &Session) -> StoreResult<Value> {
    let mut value = serde_json::to_value(session)?;
    match value.as_object_mut() {
        Some(map) => {
            map.insert(
                "schema_version".to_string(),
                Value::from(SESSION_SCHEMA_VERSION),
            );
            Ok(value)
        }
        None => Err(StoreError::invalid_document(
            "session did not serialize to an object",
        )),
    }
}

/// Deserialize a persisted session document, migrating older schema
/// versions forward.
pub fn migrate_session(mut value: Value) -> StoreResult<Session> {
    let map = value
        .as_object_mut()
        .ok_or_else(|| StoreError::invalid_document("session document is not an object"))?;

    let schema_version = match map.remove("schema_version") {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| StoreError::invalid_document("schema_version is not an integer"))?
            as u32,
        // Documents written before versioning are schema 1.
        None => 1,
    };

    match schema_version {
        1 => Ok(serde_json::from_value(value)?),
        other => Err(StoreError::UnsupportedSchema(other)),
    }
}
