use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use vigil_migration::{Migration, MigrationError, MigrationManager, MigrationPlan, MigrationRecord};

pub const CREATE_BLOCKED_IPS_TABLE: Migration = Migration::new(
    1,
    "CreateBlockedIpsTable",
    &[r#"
        CREATE TABLE IF NOT EXISTS blocked_ips (
            ip_address TEXT PRIMARY KEY,
            blocked_at INTEGER NOT NULL,
            blocked_until INTEGER NOT NULL
        )"#],
    &["DROP TABLE IF EXISTS blocked_ips"],
);

/// The local fallback list and the ingested audit log share one shape.
pub const CREATE_SECURITY_LOG_TABLES: Migration = Migration::new(
    2,
    "CreateSecurityLogTables",
    &[
        r#"
        CREATE TABLE IF NOT EXISTS local_security_logs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL,
            user_id INTEGER,
            email TEXT,
            ip_address TEXT NOT NULL,
            user_agent TEXT NOT NULL,
            action TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            location TEXT,
            suspicious INTEGER NOT NULL DEFAULT 0,
            blocked INTEGER NOT NULL DEFAULT 0
        )"#,
        r#"
        CREATE TABLE IF NOT EXISTS security_logs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL,
            user_id INTEGER,
            email TEXT,
            ip_address TEXT NOT NULL,
            user_agent TEXT NOT NULL,
            action TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            location TEXT,
            suspicious INTEGER NOT NULL DEFAULT 0,
            blocked INTEGER NOT NULL DEFAULT 0
        )"#,
    ],
    &[
        "DROP TABLE IF EXISTS local_security_logs",
        "DROP TABLE IF EXISTS security_logs",
    ],
);

pub const CREATE_INDEXES: Migration = Migration::new(
    3,
    "CreateIndexes",
    &[
        "CREATE INDEX IF NOT EXISTS idx_blocked_ips_blocked_until ON blocked_ips(blocked_until)",
        "CREATE INDEX IF NOT EXISTS idx_security_logs_ip_address ON security_logs(ip_address)",
        "CREATE INDEX IF NOT EXISTS idx_security_logs_action ON security_logs(action)",
    ],
    &[
        "DROP INDEX IF EXISTS idx_blocked_ips_blocked_until",
        "DROP INDEX IF EXISTS idx_security_logs_ip_address",
        "DROP INDEX IF EXISTS idx_security_logs_action",
    ],
);

/// Every migration this backend knows, in application order.
pub fn plan() -> Result<MigrationPlan, MigrationError> {
    MigrationPlan::new(vec![
        CREATE_BLOCKED_IPS_TABLE,
        CREATE_SECURITY_LOG_TABLES,
        CREATE_INDEXES,
    ])
}

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationManager for SqliteMigrationManager {
    async fn initialize(&self) -> Result<(), MigrationError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                checksum TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )"#,
            self.table_name()
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn applied(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let records = sqlx::query_as::<_, MigrationRecord>(&format!(
            "SELECT version, name, checksum, applied_at FROM {} ORDER BY version",
            self.table_name()
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn apply(&self, migration: &Migration) -> Result<(), MigrationError> {
        let mut tx = self.pool.begin().await?;

        for statement in migration.up() {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(&format!(
            "INSERT INTO {} (version, name, checksum, applied_at) VALUES (?, ?, ?, ?)",
            self.table_name()
        ))
        .bind(migration.version())
        .bind(migration.name())
        .bind(migration.checksum())
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn revert(&self, migration: &Migration) -> Result<(), MigrationError> {
        let mut tx = self.pool.begin().await?;

        for statement in migration.down() {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(&format!("DELETE FROM {} WHERE version = ?", self.table_name()))
            .bind(migration.version())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap();
        count == 1
    }

    #[tokio::test]
    async fn test_migrate_applies_once_and_rolls_back() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        let plan = plan().unwrap();

        assert_eq!(manager.migrate(&plan).await.unwrap(), 3);
        assert_eq!(manager.migrate(&plan).await.unwrap(), 0);

        let applied = manager.applied().await.unwrap();
        let versions: Vec<i64> = applied.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(applied[0].name, "CreateBlockedIpsTable");
        assert_eq!(applied[0].checksum, CREATE_BLOCKED_IPS_TABLE.checksum());
        assert!(table_exists(&pool, "security_logs").await);

        assert_eq!(manager.rollback_to(&plan, 1).await.unwrap(), 2);
        assert!(table_exists(&pool, "blocked_ips").await);
        assert!(!table_exists(&pool, "security_logs").await);

        assert_eq!(manager.rollback_to(&plan, 0).await.unwrap(), 1);
        assert!(!table_exists(&pool, "blocked_ips").await);
        assert!(manager.applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_refuses_drifted_schema() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        manager.migrate(&plan().unwrap()).await.unwrap();

        sqlx::query("UPDATE _vigil_migrations SET checksum = 'stale' WHERE version = 2")
            .execute(&pool)
            .await
            .unwrap();

        let err = manager.migrate(&plan().unwrap()).await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::ChecksumMismatch { version: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_migrate_refuses_newer_database() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        manager.migrate(&plan().unwrap()).await.unwrap();

        let older = MigrationPlan::new(vec![CREATE_BLOCKED_IPS_TABLE]).unwrap();
        let err = manager.migrate(&older).await.unwrap_err();
        assert!(matches!(err, MigrationError::UnknownVersion(2)));
    }
}
