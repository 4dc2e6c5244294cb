use crate::{
    Error,
    repositories::{BlockListRepository, RepositoryProvider, SecurityLogRepository},
    storage::{BlockedIp, SecurityLog},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Adapter that wraps a RepositoryProvider and implements BlockListRepository
pub struct BlockListRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> BlockListRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> BlockListRepository for BlockListRepositoryAdapter<R> {
    async fn block(
        &self,
        ip_address: &str,
        blocked_at: DateTime<Utc>,
        blocked_until: DateTime<Utc>,
    ) -> Result<BlockedIp, Error> {
        self.provider
            .block_list()
            .block(ip_address, blocked_at, blocked_until)
            .await
    }

    async fn get(&self, ip_address: &str) -> Result<Option<BlockedIp>, Error> {
        self.provider.block_list().get(ip_address).await
    }

    async fn remove(&self, ip_address: &str) -> Result<bool, Error> {
        self.provider.block_list().remove(ip_address).await
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.block_list().remove_expired(now).await
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<BlockedIp>, Error> {
        self.provider.block_list().list_active(now).await
    }
}

/// Adapter exposing the provider's local fallback list
pub struct LocalLogRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LocalLogRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> SecurityLogRepository for LocalLogRepositoryAdapter<R> {
    async fn append(&self, log: &SecurityLog, capacity: usize) -> Result<usize, Error> {
        self.provider.local_logs().append(log, capacity).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SecurityLog>, Error> {
        self.provider.local_logs().recent(limit).await
    }

    async fn count(&self) -> Result<usize, Error> {
        self.provider.local_logs().count().await
    }

    async fn clear(&self) -> Result<usize, Error> {
        self.provider.local_logs().clear().await
    }
}

/// Adapter exposing the provider's audit list
pub struct AuditLogRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AuditLogRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> SecurityLogRepository for AuditLogRepositoryAdapter<R> {
    async fn append(&self, log: &SecurityLog, capacity: usize) -> Result<usize, Error> {
        self.provider.audit_logs().append(log, capacity).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SecurityLog>, Error> {
        self.provider.audit_logs().recent(limit).await
    }

    async fn count(&self) -> Result<usize, Error> {
        self.provider.audit_logs().count().await
    }

    async fn clear(&self) -> Result<usize, Error> {
        self.provider.audit_logs().clear().await
    }
}
