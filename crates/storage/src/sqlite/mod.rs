//! `SQLite` key-value backend for guest progress.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use learn_core::Clock;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{KeyValueStore, Storage};

mod kv_repo;
mod migrate;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Migrated `local_kv` table behind a connection pool.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Open the database at `database_url` and bring its schema up to date.
    ///
    /// A missing database file is created.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the url is invalid, the database cannot be
    /// opened, or a migration fails.
    pub async fn open(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        migrate::run_migrations(&pool).await?;
        tracing::debug!(url = database_url, "guest database ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Storage {
    /// Guest progress persisted in `SQLite`.
    ///
    /// # Errors
    ///
    /// See [`SqliteKeyValueStore::open`].
    pub async fn guest_sqlite(database_url: &str, clock: Clock) -> Result<Self, SqliteInitError> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::open(database_url).await?);
        Ok(Self::local(kv, clock))
    }
}
