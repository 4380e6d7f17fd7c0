use async_trait::async_trait;
use learn_core::Clock;
use learn_core::model::{LessonId, ProgressRecord, ProgressUpdate, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::local::LocalProgressStore;
use crate::remote::{ProgressApi, RemoteProgressStore};
use crate::session::{AccessToken, SessionAuth};

/// Errors surfaced by progress stores and their backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No credential and not a guest session, or the server rejected the credential.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Network or HTTP failure talking to the remote store. Never retried here.
    #[error("remote progress store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Contract shared by the remote and guest progress stores.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// All progress records of a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotAuthenticated` when the session has no usable
    /// credential, or backend errors unchanged.
    async fn get_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Upsert the record for `(user_id, lesson_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write cannot be persisted.
    async fn update_lesson_progress(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        update: ProgressUpdate,
    ) -> Result<ProgressRecord, StorageError>;

    /// # Errors
    ///
    /// See [`ProgressStore::update_lesson_progress`].
    async fn mark_lesson_completed(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<ProgressRecord, StorageError> {
        self.update_lesson_progress(user_id, lesson_id, ProgressUpdate::completed())
            .await
    }

    /// # Errors
    ///
    /// See [`ProgressStore::update_lesson_progress`].
    async fn mark_lesson_in_progress(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<ProgressRecord, StorageError> {
        self.update_lesson_progress(user_id, lesson_id, ProgressUpdate::in_progress())
            .await
    }
}

/// Single-value-per-key persistence used for guest progress.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backend cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Simple in-memory key-value store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Which implementation a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Remote(AccessToken),
    Local,
}

impl Backend {
    /// The selection rule: a credential wins over the guest flag; with neither
    /// the session cannot track progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotAuthenticated` if the session has neither a
    /// credential nor the guest flag.
    pub fn select(session: &SessionAuth) -> Result<Self, StorageError> {
        if let Some(token) = session.access_token() {
            return Ok(Self::Remote(token.clone()));
        }
        if session.is_guest() {
            return Ok(Self::Local);
        }
        Err(StorageError::NotAuthenticated)
    }
}

/// The progress store selected for one session, behind a trait object.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressStore>,
    backend: Backend,
}

impl Storage {
    /// Pick the backend once for the whole session.
    ///
    /// Backends are never mixed within a session, so a remote outage does not
    /// fall back to guest storage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotAuthenticated` per [`Backend::select`].
    pub fn for_session(
        session: &SessionAuth,
        api: Arc<dyn ProgressApi>,
        local: Arc<dyn KeyValueStore>,
        clock: Clock,
    ) -> Result<Self, StorageError> {
        Ok(match Backend::select(session)? {
            Backend::Remote(token) => Self::remote(api, token, clock),
            Backend::Local => Self::local(local, clock),
        })
    }

    #[must_use]
    pub fn remote(api: Arc<dyn ProgressApi>, token: AccessToken, clock: Clock) -> Self {
        tracing::debug!("using remote progress store");
        Self {
            progress: Arc::new(RemoteProgressStore::new(api, token.clone(), clock)),
            backend: Backend::Remote(token),
        }
    }

    /// Guest storage over an arbitrary key-value backend.
    #[must_use]
    pub fn local(kv: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        tracing::debug!("using guest progress store");
        Self {
            progress: Arc::new(LocalProgressStore::new(kv, clock)),
            backend: Backend::Local,
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::local(Arc::new(InMemoryKeyValueStore::new()), clock)
    }

    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote(_))
    }
}
