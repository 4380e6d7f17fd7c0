//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::ParseIdError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while resolving `EngineConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("LEARN_USER_ID is required for an authenticated session")]
    MissingUserId,
    #[error("invalid user id: {0}")]
    InvalidUserId(#[from] ParseIdError),
    #[error("invalid API base url {raw:?}: {source}")]
    InvalidApiBaseUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
