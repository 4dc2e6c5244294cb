//! Repository trait for capped security-log lists.

use async_trait::async_trait;

use crate::{Error, storage::SecurityLog};

/// An append-only list of security logs with a FIFO capacity.
///
/// Two lists use this trait: the local fallback list the logger writes to when
/// the backend is unreachable, and the audit list fed by the ingest endpoint.
#[async_trait]
pub trait SecurityLogRepository: Send + Sync + 'static {
    /// Append a log and evict the oldest entries until at most `capacity` remain.
    ///
    /// # Returns
    ///
    /// The number of entries evicted.
    async fn append(&self, log: &SecurityLog, capacity: usize) -> Result<usize, Error>;

    /// The most recent `limit` entries, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<SecurityLog>, Error>;

    async fn count(&self) -> Result<usize, Error>;

    /// Remove every entry. Returns the number removed.
    async fn clear(&self) -> Result<usize, Error>;
}
