//! In-process storage backend.
//!
//! State lives for the lifetime of the provider, which matches the guard's
//! default single-process scope. Use a persistent backend to keep blocks and
//! fallback logs across restarts.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    Error,
    repositories::{
        BlockListRepository, BlockListRepositoryProvider, RepositoryProvider,
        SecurityLogRepository, SecurityLogRepositoryProvider,
    },
    storage::{BlockedIp, SecurityLog},
};

#[derive(Debug, Default)]
pub struct InMemoryBlockList {
    entries: DashMap<String, BlockedIp>,
}

impl InMemoryBlockList {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockListRepository for InMemoryBlockList {
    async fn block(
        &self,
        ip_address: &str,
        blocked_at: DateTime<Utc>,
        blocked_until: DateTime<Utc>,
    ) -> Result<BlockedIp, Error> {
        let entry = BlockedIp {
            ip_address: ip_address.to_string(),
            blocked_at,
            blocked_until,
        };
        self.entries.insert(ip_address.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get(&self, ip_address: &str) -> Result<Option<BlockedIp>, Error> {
        Ok(self.entries.get(ip_address).map(|e| e.value().clone()))
    }

    async fn remove(&self, ip_address: &str) -> Result<bool, Error> {
        Ok(self.entries.remove(ip_address).is_some())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_active_at(now));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<BlockedIp>, Error> {
        let mut active: Vec<BlockedIp> = self
            .entries
            .iter()
            .filter(|e| e.is_active_at(now))
            .map(|e| e.value().clone())
            .collect();
        active.sort_by(|a, b| a.blocked_at.cmp(&b.blocked_at));
        Ok(active)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySecurityLogStore {
    entries: Mutex<VecDeque<SecurityLog>>,
}

impl InMemorySecurityLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecurityLogRepository for InMemorySecurityLogStore {
    async fn append(&self, log: &SecurityLog, capacity: usize) -> Result<usize, Error> {
        let mut entries = self.entries.lock().await;
        entries.push_back(log.clone());

        let mut evicted = 0;
        while entries.len() > capacity {
            entries.pop_front();
            evicted += 1;
        }
        Ok(evicted)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SecurityLog>, Error> {
        let entries = self.entries.lock().await;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.iter().skip(skip).cloned().collect())
    }

    async fn count(&self) -> Result<usize, Error> {
        Ok(self.entries.lock().await.len())
    }

    async fn clear(&self) -> Result<usize, Error> {
        let mut entries = self.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

/// Repository provider holding everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryRepositoryProvider {
    block_list: InMemoryBlockList,
    local_logs: InMemorySecurityLogStore,
    audit_logs: InMemorySecurityLogStore,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockListRepositoryProvider for InMemoryRepositoryProvider {
    type BlockListRepo = InMemoryBlockList;

    fn block_list(&self) -> &Self::BlockListRepo {
        &self.block_list
    }
}

impl SecurityLogRepositoryProvider for InMemoryRepositoryProvider {
    type SecurityLogRepo = InMemorySecurityLogStore;

    fn local_logs(&self) -> &Self::SecurityLogRepo {
        &self.local_logs
    }

    fn audit_logs(&self) -> &Self::SecurityLogRepo {
        &self.audit_logs
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SecurityAction;
    use chrono::Duration;

    fn log_with_id(id: usize) -> SecurityLog {
        SecurityLog {
            id: format!("log{id}"),
            user_id: None,
            email: None,
            ip_address: "192.168.1.100".to_string(),
            user_agent: "test".to_string(),
            action: SecurityAction::LoginFailed,
            timestamp: Utc::now(),
            location: None,
            suspicious: false,
            blocked: false,
        }
    }

    #[tokio::test]
    async fn test_log_store_evicts_oldest_first() {
        let store = InMemorySecurityLogStore::new();
        let mut evicted = 0;
        for i in 0..101 {
            evicted += store.append(&log_with_id(i), 100).await.unwrap();
        }

        assert_eq!(evicted, 1);
        assert_eq!(store.count().await.unwrap(), 100);

        let all = store.recent(100).await.unwrap();
        assert_eq!(all.first().unwrap().id, "log1");
        assert_eq!(all.last().unwrap().id, "log100");
    }

    #[tokio::test]
    async fn test_log_store_recent_returns_tail_in_order() {
        let store = InMemorySecurityLogStore::new();
        for i in 0..5 {
            store.append(&log_with_id(i), 100).await.unwrap();
        }

        let ids: Vec<String> = store
            .recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["log3", "log4"]);

        assert_eq!(store.clear().await.unwrap(), 5);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_block_list_expiry() {
        let block_list = InMemoryBlockList::new();
        let now = Utc::now();

        block_list
            .block("10.0.0.50", now, now + Duration::minutes(15))
            .await
            .unwrap();
        block_list
            .block("172.16.0.25", now, now + Duration::minutes(1))
            .await
            .unwrap();

        let active = block_list.list_active(now).await.unwrap();
        assert_eq!(active.len(), 2);

        let removed = block_list
            .remove_expired(now + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(block_list.get("172.16.0.25").await.unwrap().is_none());
        assert!(block_list.get("10.0.0.50").await.unwrap().is_some());

        assert!(block_list.remove("10.0.0.50").await.unwrap());
        assert!(!block_list.remove("10.0.0.50").await.unwrap());
    }

    #[tokio::test]
    async fn test_provider_lifecycle() {
        let provider = InMemoryRepositoryProvider::new();
        provider.migrate().await.unwrap();
        provider.health_check().await.unwrap();

        provider
            .local_logs()
            .append(&log_with_id(1), 100)
            .await
            .unwrap();
        assert_eq!(provider.local_logs().count().await.unwrap(), 1);
        assert_eq!(provider.audit_logs().count().await.unwrap(), 0);
    }
}
