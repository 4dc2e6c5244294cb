use std::sync::Arc;

use chrono::Duration;
use vigil_core::{
    ManualClock, OfflineTransport, SecurityConfig,
    clock::Clock,
    repositories::{
        BlockListRepositoryAdapter, LocalLogRepositoryAdapter, RepositoryProvider,
        SecurityLogRepository, SecurityLogRepositoryProvider,
    },
    services::{IpBlockService, IpLocationResolver, SecurityEventLogger},
    storage::{NewSecurityLog, SecurityAction},
};
use vigil_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

async fn provider() -> Arc<SqliteRepositoryProvider> {
    let _ = tracing_subscriber::fmt().try_init();
    let storage = SqliteStorage::connect("sqlite::memory:")
        .await
        .expect("Failed to connect");
    let provider = Arc::new(storage.into_provider());
    provider.migrate().await.expect("Failed to migrate");
    provider
}

#[tokio::test]
async fn test_migrate_is_idempotent_and_healthy() {
    let provider = provider().await;
    provider.migrate().await.unwrap();
    provider.health_check().await.unwrap();
}

#[tokio::test]
async fn test_blocks_persist_through_services() {
    let provider = provider().await;
    let clock = Arc::new(ManualClock::epoch());
    let config = SecurityConfig::default();
    let transport = Arc::new(OfflineTransport);

    let resolver = Arc::new(IpLocationResolver::new(transport.clone(), &config));
    let logger = Arc::new(SecurityEventLogger::new(
        Arc::new(LocalLogRepositoryAdapter::new(provider.clone())),
        transport,
        resolver,
        clock.clone(),
        &config,
    ));
    let blocks = IpBlockService::new(
        Arc::new(BlockListRepositoryAdapter::new(provider.clone())),
        logger.clone(),
        clock.clone(),
        &config,
    );

    blocks.block_ip("192.168.1.100", None).await.unwrap();
    assert!(blocks.is_ip_blocked("192.168.1.100").await.unwrap());

    // Offline transport leaves the IP_BLOCKED log in the local table.
    let logs = logger.local_logs(10).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, SecurityAction::IpBlocked);
    assert!(logs[0].blocked);

    clock.advance(Duration::minutes(15));
    assert!(!blocks.is_ip_blocked("192.168.1.100").await.unwrap());
    assert!(blocks.list_blocked().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_local_log_cap_applies_in_sqlite() {
    let provider = provider().await;
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::epoch());
    let config = SecurityConfig::default().with_local_log_capacity(3);
    let transport = Arc::new(OfflineTransport);
    let resolver = Arc::new(IpLocationResolver::new(transport.clone(), &config));
    let logger = SecurityEventLogger::new(
        Arc::new(LocalLogRepositoryAdapter::new(provider.clone())),
        transport,
        resolver,
        clock,
        &config,
    );

    for i in 0..5 {
        logger
            .log_event(
                NewSecurityLog::builder()
                    .id(format!("log{i}"))
                    .action(SecurityAction::LoginFailed)
                    .ip_address("10.0.0.50")
                    .build(),
            )
            .await;
    }

    let ids: Vec<String> = provider
        .local_logs()
        .recent(10)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(ids, vec!["log2", "log3", "log4"]);
}
