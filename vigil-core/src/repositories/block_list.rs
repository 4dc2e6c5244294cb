//! Repository trait for the IP block list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, storage::BlockedIp};

/// Storage for blocked IP addresses and their expiry.
///
/// Expiry is stored, not scheduled: a block is active while `blocked_until`
/// lies in the future, and the service layer removes stale rows lazily when it
/// reads them. This keeps blocks alive across restarts for persistent backends.
#[async_trait]
pub trait BlockListRepository: Send + Sync + 'static {
    /// Insert or replace the block for `ip_address`.
    ///
    /// Re-blocking an already blocked IP moves its expiry to `blocked_until`.
    async fn block(
        &self,
        ip_address: &str,
        blocked_at: DateTime<Utc>,
        blocked_until: DateTime<Utc>,
    ) -> Result<BlockedIp, Error>;

    /// Look up the block entry for an IP, whether or not it has expired.
    async fn get(&self, ip_address: &str) -> Result<Option<BlockedIp>, Error>;

    /// Remove the entry for an IP. Returns `true` if one existed.
    async fn remove(&self, ip_address: &str) -> Result<bool, Error>;

    /// Remove every entry whose `blocked_until` is at or before `now`.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;

    /// All entries that are still active at `now`.
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<BlockedIp>, Error>;
}
