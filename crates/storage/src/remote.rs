//! Authenticated, server-backed progress store.
//!
//! Failures surface to the caller unchanged: no retry, no fallback to guest
//! storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use learn_core::Clock;
use learn_core::model::{Catalog, LessonId, ProgressRecord, ProgressUpdate, UserId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::repository::{ProgressStore, StorageError};
use crate::session::AccessToken;
use crate::wire::{WireProgressRecord, WireProgressWrite};

//
// ─── API CONTRACT ──────────────────────────────────────────────────────────────
//

/// The two progress endpoints of the content API.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// `GET /progress/users/{user_id}`
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` for a rejected credential, `RemoteUnavailable` otherwise.
    async fn fetch_progress(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> Result<Vec<WireProgressRecord>, StorageError>;

    /// `POST /progress`, returning the upserted row.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` for a rejected credential, `RemoteUnavailable` otherwise.
    async fn save_progress(
        &self,
        token: &AccessToken,
        body: &WireProgressWrite,
    ) -> Result<WireProgressRecord, StorageError>;
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct RemoteProgressStore {
    api: Arc<dyn ProgressApi>,
    token: AccessToken,
    clock: Clock,
}

impl RemoteProgressStore {
    #[must_use]
    pub fn new(api: Arc<dyn ProgressApi>, token: AccessToken, clock: Clock) -> Self {
        Self { api, token, clock }
    }
}

#[async_trait]
impl ProgressStore for RemoteProgressStore {
    async fn get_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = self.api.fetch_progress(&self.token, user_id).await?;
        tracing::debug!(user = %user_id, count = rows.len(), "remote progress fetched");
        Ok(rows.into_iter().map(|row| row.normalize(user_id)).collect())
    }

    async fn update_lesson_progress(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        update: ProgressUpdate,
    ) -> Result<ProgressRecord, StorageError> {
        let body = WireProgressWrite::new(user_id, lesson_id, &update, self.clock.now());
        let saved = self.api.save_progress(&self.token, &body).await?;
        Ok(saved.normalize(user_id))
    }
}

//
// ─── HTTP CLIENT ───────────────────────────────────────────────────────────────
//

/// reqwest client for the content API.
#[derive(Clone)]
pub struct HttpProgressApi {
    client: Client,
    base_url: Url,
}

impl HttpProgressApi {
    /// # Errors
    ///
    /// Returns `url::ParseError` if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// `GET /courses`, normalized into a catalog snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotAuthenticated` if the server rejects the token,
    /// `StorageError::RemoteUnavailable` for any other failure.
    pub async fn fetch_catalog(
        &self,
        token: Option<&AccessToken>,
    ) -> Result<Catalog, StorageError> {
        let mut request = self.client.get(self.endpoint(&["courses"])?);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }
        let catalog: Catalog = read_json(send(request).await?).await?;
        tracing::debug!(courses = catalog.courses().len(), "catalog fetched");
        Ok(catalog)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                StorageError::RemoteUnavailable(format!("invalid base url: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn fetch_progress(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> Result<Vec<WireProgressRecord>, StorageError> {
        let url = self.endpoint(&["progress", "users", user_id.as_str()])?;
        let request = self.client.get(url).bearer_auth(token.as_str());
        read_json(send(request).await?).await
    }

    async fn save_progress(
        &self,
        token: &AccessToken,
        body: &WireProgressWrite,
    ) -> Result<WireProgressRecord, StorageError> {
        let url = self.endpoint(&["progress"])?;
        let request = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .json(body);
        read_json(send(request).await?).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, StorageError> {
    request
        .send()
        .await
        .map_err(|err| StorageError::RemoteUnavailable(err.to_string()))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StorageError::NotAuthenticated);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StorageError::RemoteUnavailable(format!(
            "request failed with status {status}: {}",
            body.trim()
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| StorageError::RemoteUnavailable(format!("invalid response body: {err}")))
}

//
// ─── IN-MEMORY API ─────────────────────────────────────────────────────────────
//

type Rows = HashMap<(UserId, LessonId), ProgressRecord>;

/// Server-side upsert semantics held in memory, for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryProgressApi {
    rows: Arc<Mutex<Rows>>,
    next_id: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryProgressApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `RemoteUnavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored rows across all users.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn row_count(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.len())
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::RemoteUnavailable("simulated outage".to_owned()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Rows>, StorageError> {
        self.rows
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ProgressApi for InMemoryProgressApi {
    async fn fetch_progress(
        &self,
        _token: &AccessToken,
        user_id: &UserId,
    ) -> Result<Vec<WireProgressRecord>, StorageError> {
        self.check_available()?;
        let guard = self.lock()?;
        let mut rows: Vec<ProgressRecord> = guard
            .values()
            .filter(|row| &row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows.into_iter().map(WireProgressRecord::from).collect())
    }

    async fn save_progress(
        &self,
        _token: &AccessToken,
        body: &WireProgressWrite,
    ) -> Result<WireProgressRecord, StorageError> {
        self.check_available()?;
        let mut guard = self.lock()?;
        let key = (body.user_id.clone(), body.lesson_id.clone());

        let row = match guard.get_mut(&key) {
            Some(existing) => {
                existing.status = body.status;
                existing.score = body.score;
                existing.attempts = body.attempts.max(1);
                if body.completed_at.is_some() {
                    existing.completed_at = body.completed_at;
                }
                existing.clone()
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let created = ProgressRecord {
                    id: Some(format!("row-{id:06}")),
                    user_id: body.user_id.clone(),
                    lesson_id: body.lesson_id.clone(),
                    status: body.status,
                    score: body.score,
                    attempts: body.attempts.max(1),
                    completed_at: body.completed_at,
                    time_spent_seconds: None,
                };
                guard.insert(key, created.clone());
                created
            }
        };
        Ok(WireProgressRecord::from(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::ProgressStatus;
    use learn_core::time::{fixed_clock, fixed_now};

    fn remote(api: &InMemoryProgressApi) -> RemoteProgressStore {
        let token = AccessToken::new("token").unwrap();
        RemoteProgressStore::new(Arc::new(api.clone()), token, fixed_clock())
    }

    #[tokio::test]
    async fn completion_is_an_upsert() {
        let api = InMemoryProgressApi::new();
        let store = remote(&api);
        let user = UserId::new("u1");
        let lesson = LessonId::new("py-001");

        store.mark_lesson_in_progress(&user, &lesson).await.unwrap();
        let done = store.mark_lesson_completed(&user, &lesson).await.unwrap();
        store.mark_lesson_completed(&user, &lesson).await.unwrap();

        assert_eq!(done.status, ProgressStatus::Completed);
        assert_eq!(done.completed_at, Some(fixed_now()));
        assert_eq!(api.row_count().unwrap(), 1);

        let all = store.get_user_progress(&user).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].user_id, user);
    }

    #[tokio::test]
    async fn outage_surfaces_unchanged() {
        let api = InMemoryProgressApi::new();
        let store = remote(&api);
        api.set_unavailable(true);

        let err = store
            .mark_lesson_completed(&UserId::new("u1"), &LessonId::new("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RemoteUnavailable(_)));

        let err = store
            .get_user_progress(&UserId::new("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RemoteUnavailable(_)));
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let api = HttpProgressApi::new("http://localhost:8000/api/").unwrap();
        let url = api.endpoint(&["progress", "users", "a b/c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/progress/users/a%20b%2Fc"
        );

        let api = HttpProgressApi::new("http://localhost:8000").unwrap();
        let url = api.endpoint(&["courses"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/courses");
    }

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(HttpProgressApi::new("/progress").is_err());
    }
}
