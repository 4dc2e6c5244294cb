//! SQLite implementation of the security log lists.
//!
//! One repository type serves both the local fallback list and the audit log;
//! each instance is bound to its own table.

use async_trait::async_trait;
use sqlx::SqlitePool;
use vigil_core::{
    Error,
    error::StorageError,
    map_storage_err,
    repositories::SecurityLogRepository,
    storage::{Location, SecurityLog},
};

use super::block_list::from_millis;

pub(crate) const LOCAL_LOGS_TABLE: &str = "local_security_logs";
pub(crate) const AUDIT_LOGS_TABLE: &str = "security_logs";

pub struct SqliteSecurityLogRepository {
    pool: SqlitePool,
    table: &'static str,
}

impl SqliteSecurityLogRepository {
    /// Repository over the local fallback list.
    pub fn local(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: LOCAL_LOGS_TABLE,
        }
    }

    /// Repository over the ingested audit log.
    pub fn audit(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: AUDIT_LOGS_TABLE,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteSecurityLog {
    id: String,
    user_id: Option<i64>,
    email: Option<String>,
    ip_address: String,
    user_agent: String,
    action: String,
    timestamp: i64,
    location: Option<String>,
    suspicious: bool,
    blocked: bool,
}

impl TryFrom<SqliteSecurityLog> for SecurityLog {
    type Error = Error;

    fn try_from(row: SqliteSecurityLog) -> Result<Self, Self::Error> {
        let location = row
            .location
            .map(|json| serde_json::from_str::<Location>(&json))
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(SecurityLog {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            action: row.action.into(),
            timestamp: from_millis(row.timestamp)?,
            location,
            suspicious: row.suspicious,
            blocked: row.blocked,
        })
    }
}

#[async_trait]
impl SecurityLogRepository for SqliteSecurityLogRepository {
    async fn append(&self, log: &SecurityLog, capacity: usize) -> Result<usize, Error> {
        let location = log
            .location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut tx = map_storage_err!(
            self.pool.begin().await,
            "Failed to append security log",
            table = self.table
        )?;

        let insert = format!(
            r#"
            INSERT INTO {} (id, user_id, email, ip_address, user_agent, action, timestamp, location, suspicious, blocked)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            self.table
        );
        map_storage_err!(
            sqlx::query(&insert)
                .bind(&log.id)
                .bind(log.user_id)
                .bind(&log.email)
                .bind(&log.ip_address)
                .bind(&log.user_agent)
                .bind(log.action.as_str())
                .bind(log.timestamp.timestamp_millis())
                .bind(location)
                .bind(log.suspicious)
                .bind(log.blocked)
                .execute(&mut *tx)
                .await,
            "Failed to append security log",
            table = self.table
        )?;

        let evict = format!(
            "DELETE FROM {table} WHERE seq NOT IN (SELECT seq FROM {table} ORDER BY seq DESC LIMIT ?)",
            table = self.table
        );
        let evicted = map_storage_err!(
            sqlx::query(&evict)
                .bind(capacity as i64)
                .execute(&mut *tx)
                .await,
            "Failed to append security log",
            table = self.table
        )?;

        map_storage_err!(
            tx.commit().await,
            "Failed to append security log",
            table = self.table
        )?;

        Ok(evicted.rows_affected() as usize)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SecurityLog>, Error> {
        let select = format!(
            r#"
            SELECT id, user_id, email, ip_address, user_agent, action, timestamp, location, suspicious, blocked
            FROM (SELECT * FROM {} ORDER BY seq DESC LIMIT ?)
            ORDER BY seq ASC
            "#,
            self.table
        );
        let rows = map_storage_err!(
            sqlx::query_as::<_, SqliteSecurityLog>(&select)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await,
            "Failed to read security logs",
            table = self.table
        )?;

        rows.into_iter().map(SecurityLog::try_from).collect()
    }

    async fn count(&self) -> Result<usize, Error> {
        let count: i64 = map_storage_err!(
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
                .fetch_one(&self.pool)
                .await,
            "Failed to count security logs",
            table = self.table
        )?;

        Ok(count as usize)
    }

    async fn clear(&self) -> Result<usize, Error> {
        let result = map_storage_err!(
            sqlx::query(&format!("DELETE FROM {}", self.table))
                .execute(&self.pool)
                .await,
            "Failed to clear security logs",
            table = self.table
        )?;

        Ok(result.rows_affected() as usize)
    }
}
