//! Repository implementations for SQLite storage

pub mod block_list;
pub mod security_log;

pub use block_list::SqliteBlockListRepository;
pub use security_log::SqliteSecurityLogRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use vigil_core::{
    Error,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::{
        BlockListRepositoryProvider, RepositoryProvider, SecurityLogRepositoryProvider,
    },
};
use vigil_migration::{MigrationError, MigrationManager};

use crate::migrations::{self, SqliteMigrationManager};

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    block_list: Arc<SqliteBlockListRepository>,
    local_logs: Arc<SqliteSecurityLogRepository>,
    audit_logs: Arc<SqliteSecurityLogRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let block_list = Arc::new(SqliteBlockListRepository::new(pool.clone()));
        let local_logs = Arc::new(SqliteSecurityLogRepository::local(pool.clone()));
        let audit_logs = Arc::new(SqliteSecurityLogRepository::audit(pool.clone()));

        Self {
            pool,
            block_list,
            local_logs,
            audit_logs,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl BlockListRepositoryProvider for SqliteRepositoryProvider {
    type BlockListRepo = SqliteBlockListRepository;

    fn block_list(&self) -> &Self::BlockListRepo {
        &self.block_list
    }
}

impl SecurityLogRepositoryProvider for SqliteRepositoryProvider {
    type SecurityLogRepo = SqliteSecurityLogRepository;

    fn local_logs(&self) -> &Self::SecurityLogRepo {
        &self.local_logs
    }

    fn audit_logs(&self) -> &Self::SecurityLogRepo {
        &self.audit_logs
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let plan = migrations::plan().map_err(migration_error)?;
        let manager = SqliteMigrationManager::new(self.pool.clone());

        let count = manager.migrate(&plan).await.map_err(migration_error)?;
        if count > 0 {
            tracing::info!(count, latest = ?plan.latest_version(), "SQLite schema migrated");
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Health check failed")?;
        Ok(())
    }
}

fn migration_error(error: MigrationError) -> Error {
    tracing::error!(error = %error, "Failed to run migrations");
    Error::Storage(StorageError::Migration(error.to_string()))
}
