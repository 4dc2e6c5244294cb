//! SQLite implementation of the IP block list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use vigil_core::{
    Error, error::StorageError, map_storage_err, repositories::BlockListRepository,
    storage::BlockedIp,
};

pub struct SqliteBlockListRepository {
    pool: SqlitePool,
}

impl SqliteBlockListRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Timestamps are stored as unix milliseconds.
#[derive(Debug, sqlx::FromRow)]
struct SqliteBlockedIp {
    ip_address: String,
    blocked_at: i64,
    blocked_until: i64,
}

impl TryFrom<SqliteBlockedIp> for BlockedIp {
    type Error = Error;

    fn try_from(row: SqliteBlockedIp) -> Result<Self, Self::Error> {
        Ok(BlockedIp {
            ip_address: row.ip_address,
            blocked_at: from_millis(row.blocked_at)?,
            blocked_until: from_millis(row.blocked_until)?,
        })
    }
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        Error::Storage(StorageError::Serialization(format!(
            "Invalid timestamp: {millis}"
        )))
    })
}

#[async_trait]
impl BlockListRepository for SqliteBlockListRepository {
    async fn block(
        &self,
        ip_address: &str,
        blocked_at: DateTime<Utc>,
        blocked_until: DateTime<Utc>,
    ) -> Result<BlockedIp, Error> {
        let row = map_storage_err!(
            sqlx::query_as::<_, SqliteBlockedIp>(
                r#"
                INSERT INTO blocked_ips (ip_address, blocked_at, blocked_until)
                VALUES (?, ?, ?)
                ON CONFLICT(ip_address) DO UPDATE SET
                    blocked_at = excluded.blocked_at,
                    blocked_until = excluded.blocked_until
                RETURNING ip_address, blocked_at, blocked_until
                "#,
            )
            .bind(ip_address)
            .bind(blocked_at.timestamp_millis())
            .bind(blocked_until.timestamp_millis())
            .fetch_one(&self.pool)
            .await,
            "Failed to block IP",
            ip = ip_address
        )?;

        row.try_into()
    }

    async fn get(&self, ip_address: &str) -> Result<Option<BlockedIp>, Error> {
        let row = map_storage_err!(
            sqlx::query_as::<_, SqliteBlockedIp>(
                "SELECT ip_address, blocked_at, blocked_until FROM blocked_ips WHERE ip_address = ?",
            )
            .bind(ip_address)
            .fetch_optional(&self.pool)
            .await,
            "Failed to get blocked IP",
            ip = ip_address
        )?;

        row.map(BlockedIp::try_from).transpose()
    }

    async fn remove(&self, ip_address: &str) -> Result<bool, Error> {
        let result = map_storage_err!(
            sqlx::query("DELETE FROM blocked_ips WHERE ip_address = ?")
                .bind(ip_address)
                .execute(&self.pool)
                .await,
            "Failed to remove blocked IP",
            ip = ip_address
        )?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = map_storage_err!(
            sqlx::query("DELETE FROM blocked_ips WHERE blocked_until <= ?")
                .bind(now.timestamp_millis())
                .execute(&self.pool)
                .await,
            "Failed to remove expired blocks"
        )?;

        Ok(result.rows_affected())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<BlockedIp>, Error> {
        let rows = map_storage_err!(
            sqlx::query_as::<_, SqliteBlockedIp>(
                r#"
                SELECT ip_address, blocked_at, blocked_until
                FROM blocked_ips
                WHERE blocked_until > ?
                ORDER BY blocked_at ASC
                "#,
            )
            .bind(now.timestamp_millis())
            .fetch_all(&self.pool)
            .await,
            "Failed to list blocked IPs"
        )?;

        rows.into_iter().map(BlockedIp::try_from).collect()
    }
}
