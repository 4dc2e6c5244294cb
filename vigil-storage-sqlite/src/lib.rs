//! SQLite storage backend for vigil.
//!
//! Keeps the IP block list and both security-log lists in SQLite so blocks
//! and undelivered logs survive a restart.
//!
//! ```rust,no_run
//! use vigil_core::repositories::RepositoryProvider;
//! use vigil_storage_sqlite::SqliteStorage;
//!
//! # async fn run() -> Result<(), vigil_core::Error> {
//! let storage = SqliteStorage::connect("sqlite://vigil.db?mode=rwc").await?;
//! let provider = storage.into_provider();
//! provider.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod repositories;

pub use repositories::{
    SqliteBlockListRepository, SqliteRepositoryProvider, SqliteSecurityLogRepository,
};

use sqlx::SqlitePool;
use vigil_core::{Error, error::StorageError};

/// Owns the connection pool and hands out the repository provider.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`, e.g. `sqlite::memory:` or `sqlite://vigil.db?mode=rwc`.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(database_url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite");
            StorageError::Connection(e.to_string())
        })?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }
}
