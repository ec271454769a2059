//! Typed session repository over a [`VersionedStore`].

use chrono::Utc;
use tracing::{debug, info, warn};

use shotflow_models::{Session, SessionId};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_save;
use crate::migrate::{migrate_session, session_to_document};
use crate::store::VersionedStore;

const COLLECTION: &str = "sessions";

/// Durable CRUD for sessions with optimistic-concurrency versioning.
pub struct SessionStore<S> {
    store: S,
}

impl<S: VersionedStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persist a freshly created session (version 1). Fails fast if a
    /// session with the same ID already exists.
    pub async fn create(&self, session: &Session) -> StoreResult<u64> {
        let doc = session_to_document(session)?;
        let version = self
            .store
            .create(COLLECTION, session.id.as_str(), doc)
            .await?;
        record_save(COLLECTION);
        info!(session_id = %session.id, "Created session");
        Ok(version)
    }

    /// Fetch a session by ID.
    pub async fn get(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        match self.store.get(COLLECTION, id.as_str()).await? {
            Some(doc) => {
                let mut session = migrate_session(doc.data)?;
                // The store's envelope version is authoritative.
                session.version = doc.version;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Fetch a session, erroring if absent.
    pub async fn get_required(&self, id: &SessionId) -> StoreResult<Session> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", COLLECTION, id)))
    }

    /// List sessions owned by a user.
    pub async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Session>> {
        let docs = self.store.list(COLLECTION).await?;
        let mut sessions = Vec::new();
        for doc in docs {
            let version = doc.version;
            let mut session = migrate_session(doc.data)?;
            session.version = version;
            if session.user_id == user_id {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Unconditional increment-on-write. Use only for non-racing paths;
    /// concurrent writers must go through [`Self::save_with_version`].
    pub async fn save(&self, session: &mut Session) -> StoreResult<u64> {
        session.updated_at = Utc::now();
        let doc = session_to_document(session)?;
        let version = self.store.save(COLLECTION, session.id.as_str(), doc).await?;
        session.version = version;
        record_save(COLLECTION);
        Ok(version)
    }

    /// Compare-and-swap write. Succeeds only if the stored version still
    /// equals `expected_version`; on success the session's `version` becomes
    /// `expected_version + 1`. On conflict returns
    /// [`StoreError::VersionMismatch`] carrying both versions.
    pub async fn save_with_version(
        &self,
        session: &mut Session,
        expected_version: u64,
    ) -> StoreResult<u64> {
        let mut candidate = session.clone();
        candidate.version = expected_version + 1;
        candidate.updated_at = Utc::now();
        let doc = session_to_document(&candidate)?;

        let version = self
            .store
            .cas_save(COLLECTION, session.id.as_str(), expected_version, doc)
            .await?;

        session.version = version;
        session.updated_at = candidate.updated_at;
        record_save(COLLECTION);
        debug!(session_id = %session.id, version, "Versioned save committed");
        Ok(version)
    }

    /// Read-modify-write with CAS conflict retries. `mutate` is re-applied
    /// to a freshly fetched session on every attempt.
    pub async fn update<F>(
        &self,
        id: &SessionId,
        max_attempts: u32,
        mutate: F,
    ) -> StoreResult<Session>
    where
        F: Fn(&mut Session),
    {
        let mut last_conflict = None;
        for attempt in 1..=max_attempts.max(1) {
            let mut session = self.get_required(id).await?;
            let expected = session.version;
            mutate(&mut session);

            match self.save_with_version(&mut session, expected).await {
                Ok(_) => return Ok(session),
                Err(e) if e.is_version_mismatch() && attempt < max_attempts => {
                    warn!(
                        session_id = %id,
                        attempt,
                        "Versioned save lost a race, refetching: {}",
                        e
                    );
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_conflict.unwrap_or_else(|| StoreError::backend("update retry loop exhausted")))
    }

    /// Delete a session.
    pub async fn delete(&self, id: &SessionId) -> StoreResult<()> {
        self.store.delete(COLLECTION, id.as_str()).await
    }
}
