//! Server-side audit trail fed by the security log endpoint.

use std::sync::Arc;

use crate::{
    Error, error::utilities::RequiredFieldExt, repositories::SecurityLogRepository,
    storage::SecurityLog,
};

pub struct AuditLogService<A: SecurityLogRepository> {
    repository: Arc<A>,
    capacity: usize,
}

impl<A: SecurityLogRepository> AuditLogService<A> {
    pub fn new(repository: Arc<A>, capacity: usize) -> Self {
        Self {
            repository,
            capacity,
        }
    }

    /// Validate and store a log shipped by a client.
    pub async fn ingest(&self, log: SecurityLog) -> Result<SecurityLog, Error> {
        log.id.as_str().require_field("id")?;
        log.ip_address.as_str().require_field("ipAddress")?;

        let evicted = self.repository.append(&log, self.capacity).await?;
        tracing::debug!(
            log_id = %log.id,
            action = %log.action,
            suspicious = log.suspicious,
            evicted,
            "Security log ingested"
        );
        if log.suspicious {
            tracing::warn!(ip = %log.ip_address, action = %log.action, "Suspicious activity reported");
        }

        Ok(log)
    }

    /// The most recent `limit` ingested logs, oldest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<SecurityLog>, Error> {
        self.repository.recent(limit).await
    }

    pub async fn count(&self) -> Result<usize, Error> {
        self.repository.count().await
    }
}
