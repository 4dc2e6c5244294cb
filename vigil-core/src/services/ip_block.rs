//! IP block manager.
//!
//! A block is a stored expiry timestamp. [`IpBlockService::is_ip_blocked`]
//! compares it against the clock on every call and removes stale entries, so
//! blocks lift on time without a live timer and survive restarts whenever the
//! repository is persistent.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Error,
    clock::Clock,
    config::SecurityConfig,
    events::{Event, EventBus, UnblockReason},
    repositories::{BlockListRepository, SecurityLogRepository},
    services::security_log::SecurityEventLogger,
    storage::{BlockedIp, NewSecurityLog, SecurityAction},
    transport::SecurityTransport,
};

pub struct IpBlockService<B, L, T>
where
    B: BlockListRepository,
    L: SecurityLogRepository,
    T: SecurityTransport,
{
    repository: Arc<B>,
    logger: Arc<SecurityEventLogger<L, T>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    block_duration: Duration,
}

impl<B, L, T> IpBlockService<B, L, T>
where
    B: BlockListRepository,
    L: SecurityLogRepository,
    T: SecurityTransport,
{
    pub fn new(
        repository: Arc<B>,
        logger: Arc<SecurityEventLogger<L, T>>,
        clock: Arc<dyn Clock>,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            repository,
            logger,
            clock,
            event_bus: None,
            block_duration: config.block_duration,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }

    /// Block an IP for the configured duration and record an `IP_BLOCKED` event.
    ///
    /// `email` is the account whose failed attempts triggered the block, if any.
    pub async fn block_ip(&self, ip_address: &str, email: Option<&str>) -> Result<BlockedIp, Error> {
        let now = self.clock.now();
        let blocked_until = now + self.block_duration;
        let blocked = self
            .repository
            .block(ip_address, now, blocked_until)
            .await?;

        tracing::info!(
            ip = %ip_address,
            blocked_until = %blocked_until,
            "IP address blocked"
        );

        self.publish(Event::IpBlocked {
            ip_address: ip_address.to_string(),
            blocked_until,
            timestamp: now,
        })
        .await;

        self.logger
            .log_event(
                NewSecurityLog::builder()
                    .action(SecurityAction::IpBlocked)
                    .ip_address(ip_address)
                    .maybe_email(email.map(str::to_string))
                    .timestamp(now)
                    .suspicious(true)
                    .blocked(true)
                    .build(),
            )
            .await;

        Ok(blocked)
    }

    /// Whether the IP is blocked right now. Expired entries are removed.
    pub async fn is_ip_blocked(&self, ip_address: &str) -> Result<bool, Error> {
        Ok(self.active_block(ip_address).await?.is_some())
    }

    /// Expiry of the active block on this IP, if any.
    pub async fn blocked_until(&self, ip_address: &str) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self
            .active_block(ip_address)
            .await?
            .map(|blocked| blocked.blocked_until))
    }

    /// Lift a block before it expires. Returns `true` if the IP was blocked.
    pub async fn unblock_ip(&self, ip_address: &str) -> Result<bool, Error> {
        let was_blocked = self.active_block(ip_address).await?.is_some();
        if !was_blocked {
            return Ok(false);
        }

        self.repository.remove(ip_address).await?;
        tracing::info!(ip = %ip_address, "IP address unblocked");
        self.publish(Event::IpUnblocked {
            ip_address: ip_address.to_string(),
            reason: UnblockReason::Manual,
            timestamp: self.clock.now(),
        })
        .await;

        Ok(true)
    }

    /// Every block still active.
    pub async fn list_blocked(&self) -> Result<Vec<BlockedIp>, Error> {
        self.repository.list_active(self.clock.now()).await
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        self.repository.remove_expired(self.clock.now()).await
    }

    /// Start the background cleanup task.
    ///
    /// Expired blocks are already ignored by reads; this only keeps the store
    /// from growing.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    /// * `period` - How often to purge expired entries
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        period: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let clock = Arc::clone(&self.clock);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match repository.remove_expired(clock.now()).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count, "Purged expired IP blocks");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to purge expired IP blocks");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down IP block cleanup task");
                        break;
                    }
                }
            }
        })
    }

    async fn active_block(&self, ip_address: &str) -> Result<Option<BlockedIp>, Error> {
        let Some(blocked) = self.repository.get(ip_address).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if blocked.is_active_at(now) {
            return Ok(Some(blocked));
        }

        if self.repository.remove(ip_address).await? {
            tracing::info!(ip = %ip_address, "IP block expired");
            self.publish(Event::IpUnblocked {
                ip_address: ip_address.to_string(),
                reason: UnblockReason::Expired,
                timestamp: now,
            })
            .await;
        }

        Ok(None)
    }

    async fn publish(&self, event: Event) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish(event).await;
        }
    }
}
