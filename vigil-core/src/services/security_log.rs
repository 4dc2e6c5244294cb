//! Security event logger.
//!
//! Assembles a [`SecurityLog`] from a partial record, ships it to the backend
//! and keeps a capped local copy when the backend cannot be reached. Delivery
//! is best-effort and at-most-once: failures are logged and never returned.

use std::sync::Arc;

use crate::{
    clock::Clock,
    config::SecurityConfig,
    events::{DeliveryOutcome, Event, EventBus},
    id::generate_log_id,
    repositories::SecurityLogRepository,
    services::resolver::IpLocationResolver,
    storage::{NewSecurityLog, SecurityAction, SecurityLog},
    transport::SecurityTransport,
};

pub struct SecurityEventLogger<L: SecurityLogRepository, T: SecurityTransport> {
    local_logs: Arc<L>,
    transport: Arc<T>,
    resolver: Arc<IpLocationResolver<T>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    endpoint: String,
    user_agent: String,
    local_capacity: usize,
}

impl<L: SecurityLogRepository, T: SecurityTransport> SecurityEventLogger<L, T> {
    pub fn new(
        local_logs: Arc<L>,
        transport: Arc<T>,
        resolver: Arc<IpLocationResolver<T>>,
        clock: Arc<dyn Clock>,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            local_logs,
            transport,
            resolver,
            clock,
            event_bus: None,
            endpoint: config.log_endpoint(),
            user_agent: config.user_agent.clone(),
            local_capacity: config.local_log_capacity,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Fill in every field the caller left unset.
    pub async fn assemble(&self, partial: NewSecurityLog) -> SecurityLog {
        let timestamp = partial.timestamp.unwrap_or_else(|| self.clock.now());
        let ip_address = match partial.ip_address {
            Some(ip) => ip,
            None => self.resolver.client_ip().await,
        };
        let location = partial
            .location
            .or_else(|| self.resolver.location_for(&ip_address));

        SecurityLog {
            id: partial.id.unwrap_or_else(|| generate_log_id(timestamp)),
            user_id: partial.user_id,
            email: partial.email,
            ip_address,
            user_agent: partial
                .user_agent
                .unwrap_or_else(|| self.user_agent.clone()),
            action: partial.action.unwrap_or(SecurityAction::Unknown),
            timestamp,
            location,
            suspicious: partial.suspicious.unwrap_or(false),
            blocked: partial.blocked.unwrap_or(false),
        }
    }

    /// Assemble and deliver a security log.
    ///
    /// Never fails: a transport error stores the record locally, and a local
    /// storage error drops it.
    pub async fn log_event(&self, partial: NewSecurityLog) -> DeliveryOutcome {
        let log = self.assemble(partial).await;
        let outcome = self.deliver(&log).await;

        if let Some(event_bus) = &self.event_bus {
            event_bus
                .publish(Event::SecurityLogged {
                    log_id: log.id.clone(),
                    action: log.action.clone(),
                    outcome,
                })
                .await;
        }

        outcome
    }

    /// Run [`log_event`](Self::log_event) on the runtime without waiting for it.
    pub fn spawn_log_event(
        self: &Arc<Self>,
        partial: NewSecurityLog,
    ) -> tokio::task::JoinHandle<DeliveryOutcome> {
        let logger = Arc::clone(self);
        tokio::spawn(async move { logger.log_event(partial).await })
    }

    /// The most recent locally stored logs, oldest first.
    pub async fn local_logs(&self, limit: usize) -> Vec<SecurityLog> {
        match self.local_logs.recent(limit).await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read local security logs");
                Vec::new()
            }
        }
    }

    async fn deliver(&self, log: &SecurityLog) -> DeliveryOutcome {
        let error = match self.transport.post_security_log(&self.endpoint, log).await {
            Ok(()) => {
                tracing::debug!(log_id = %log.id, action = %log.action, "Security log delivered");
                return DeliveryOutcome::Delivered;
            }
            Err(e) => e,
        };

        tracing::warn!(
            error = %error,
            log_id = %log.id,
            action = %log.action,
            "Failed to deliver security log, storing locally"
        );

        match self.local_logs.append(log, self.local_capacity).await {
            Ok(evicted) => {
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted oldest local security logs");
                }
                DeliveryOutcome::StoredLocally
            }
            Err(e) => {
                tracing::error!(error = %e, log_id = %log.id, "Failed to store security log locally");
                DeliveryOutcome::Dropped
            }
        }
    }
}
