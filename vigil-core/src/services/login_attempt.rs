//! Login attempt tracking.
//!
//! Attempts are kept per `(ip, email)` pair in a sliding window and pruned on
//! every access. Only failures count toward the block threshold; a success
//! does not reset failures that are still inside the window.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;

use crate::{
    Error,
    clock::Clock,
    config::SecurityConfig,
    events::{Event, EventBus},
    repositories::{BlockListRepository, SecurityLogRepository},
    services::ip_block::IpBlockService,
    storage::LoginAttempt,
    transport::SecurityTransport,
};

pub struct LoginAttemptTracker<B, L, T>
where
    B: BlockListRepository,
    L: SecurityLogRepository,
    T: SecurityTransport,
{
    attempts: DashMap<String, Vec<LoginAttempt>>,
    ip_blocks: Arc<IpBlockService<B, L, T>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    max_login_attempts: u32,
    attempt_window: Duration,
}

fn attempt_key(ip_address: &str, email: &str) -> String {
    format!("{ip_address}_{email}")
}

impl<B, L, T> LoginAttemptTracker<B, L, T>
where
    B: BlockListRepository,
    L: SecurityLogRepository,
    T: SecurityTransport,
{
    pub fn new(
        ip_blocks: Arc<IpBlockService<B, L, T>>,
        clock: Arc<dyn Clock>,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            attempts: DashMap::new(),
            ip_blocks,
            clock,
            event_bus: None,
            max_login_attempts: config.max_login_attempts,
            attempt_window: config.attempt_window,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Record an attempt and report whether further attempts are allowed.
    ///
    /// A failure that brings the failures in the window to the threshold blocks
    /// the IP and returns `false`.
    pub async fn track(&self, ip_address: &str, email: &str, success: bool) -> Result<bool, Error> {
        let now = self.clock.now();
        let cutoff = now - self.attempt_window;

        let failed_attempts = {
            let mut entry = self
                .attempts
                .entry(attempt_key(ip_address, email))
                .or_default();
            entry.push(LoginAttempt {
                ip_address: ip_address.to_string(),
                email: email.to_string(),
                success,
                timestamp: now,
            });
            entry.retain(|attempt| attempt.timestamp > cutoff);
            entry.iter().filter(|attempt| !attempt.success).count()
        };

        if success {
            return Ok(true);
        }

        tracing::debug!(ip = %ip_address, failed_attempts, "Failed login attempt recorded");
        if let Some(event_bus) = &self.event_bus {
            event_bus
                .publish(Event::LoginFailed {
                    ip_address: ip_address.to_string(),
                    email: email.to_string(),
                    failed_attempts,
                    timestamp: now,
                })
                .await;
        }

        if failed_attempts >= self.max_login_attempts as usize {
            tracing::warn!(
                ip = %ip_address,
                failed_attempts,
                "Login attempt threshold reached, blocking IP"
            );
            self.ip_blocks.block_ip(ip_address, Some(email)).await?;
            return Ok(false);
        }

        Ok(true)
    }

    /// Attempts for the pair still inside the window, oldest first.
    pub fn recent_attempts(&self, ip_address: &str, email: &str) -> Vec<LoginAttempt> {
        let cutoff = self.clock.now() - self.attempt_window;
        self.attempts
            .get(&attempt_key(ip_address, email))
            .map(|attempts| {
                attempts
                    .iter()
                    .filter(|attempt| attempt.timestamp > cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Failures for the pair still inside the window.
    pub fn failed_attempts(&self, ip_address: &str, email: &str) -> usize {
        self.recent_attempts(ip_address, email)
            .iter()
            .filter(|attempt| !attempt.success)
            .count()
    }

    /// Forget every attempt for the pair.
    pub fn reset(&self, ip_address: &str, email: &str) {
        self.attempts.remove(&attempt_key(ip_address, email));
    }

    /// Drop attempts that have left the window, and pairs left with none.
    pub fn purge_expired(&self) -> usize {
        let cutoff = self.clock.now() - self.attempt_window;
        let before = self.attempts.len();
        self.attempts.retain(|_, attempts| {
            attempts.retain(|attempt| attempt.timestamp > cutoff);
            !attempts.is_empty()
        });
        before.saturating_sub(self.attempts.len())
    }

    pub fn ip_blocks(&self) -> &Arc<IpBlockService<B, L, T>> {
        &self.ip_blocks
    }
}
