use std::sync::Arc;

use learn_core::model::{Catalog, LessonId, UserId};
use storage::remote::{HttpProgressApi, ProgressApi};
use storage::repository::{Backend, Storage};

use crate::Clock;
use crate::completion::{CompletionCoordinator, LessonAttempt};
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles the session's services over the one selected progress store.
#[derive(Clone)]
pub struct AppServices {
    user_id: UserId,
    storage: Storage,
    api: Arc<HttpProgressApi>,
    progress: Arc<ProgressService>,
    completion: Arc<CompletionCoordinator>,
}

impl AppServices {
    /// Select the backend for the configured session and build services on it.
    ///
    /// Guest sessions open (and migrate) the `SQLite` store at `db_url`; the
    /// database is not touched for credentialed sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Config` for an unusable configuration,
    /// `AppServicesError::Storage` for a session that is neither authenticated
    /// nor guest, and `AppServicesError::Sqlite` if guest storage cannot open.
    pub async fn from_config(
        config: &EngineConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let backend = Backend::select(&config.session())?;
        let user_id = config.user_id(&backend)?;
        let api = Arc::new(config.http_api()?);

        let storage = match backend {
            Backend::Remote(token) => {
                let remote: Arc<dyn ProgressApi> = api.clone();
                Storage::remote(remote, token, clock)
            }
            Backend::Local => Storage::guest_sqlite(&config.db_url, clock).await?,
        };
        tracing::debug!(user = %user_id, remote = storage.is_remote(), "session storage ready");

        Ok(Self::with_storage(user_id, storage, api))
    }

    /// Build services over an already selected store.
    #[must_use]
    pub fn with_storage(user_id: UserId, storage: Storage, api: Arc<HttpProgressApi>) -> Self {
        let progress = Arc::new(ProgressService::new(Arc::clone(&storage.progress)));
        let completion = Arc::new(CompletionCoordinator::new(Arc::clone(&storage.progress)));
        Self {
            user_id,
            storage,
            api,
            progress,
            completion,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn completion(&self) -> Arc<CompletionCoordinator> {
        Arc::clone(&self.completion)
    }

    /// A fresh attempt at `lesson_id` for this session's user.
    #[must_use]
    pub fn attempt(&self, lesson_id: LessonId) -> LessonAttempt {
        LessonAttempt::new(self.user_id.clone(), lesson_id)
    }

    /// Fetch a catalog snapshot from `GET /courses`.
    ///
    /// The session credential is sent when there is one.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if the fetch fails.
    pub async fn fetch_catalog(&self) -> Result<Catalog, AppServicesError> {
        let token = match self.storage.backend() {
            Backend::Remote(token) => Some(token),
            Backend::Local => None,
        };
        Ok(self.api.fetch_catalog(token).await?)
    }
}
