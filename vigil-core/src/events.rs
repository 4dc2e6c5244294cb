use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{error::EventError, oauth::OAuthProvider, storage::SecurityAction};

/// Why an IP left the block list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnblockReason {
    /// The block duration elapsed
    Expired,
    /// An operator removed the block
    Manual,
}

/// Where a security log ended up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the backend
    Delivered,
    /// Backend unreachable; appended to the local fallback list
    StoredLocally,
    /// Both the backend and the local store failed
    Dropped,
}

/// Events emitted by the guard services.
///
/// Handlers receive every decision the guard makes, which makes the bus a
/// convenient hook for metrics or alerting without touching the services.
#[derive(Debug, Clone)]
pub enum Event {
    /// A failed login attempt was recorded.
    LoginFailed {
        ip_address: String,
        email: String,
        /// Failed attempts inside the current attempt window, this one included
        failed_attempts: usize,
        timestamp: DateTime<Utc>,
    },

    /// An IP crossed the failure threshold and is now blocked.
    IpBlocked {
        ip_address: String,
        blocked_until: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// An IP left the block list.
    IpUnblocked {
        ip_address: String,
        reason: UnblockReason,
        timestamp: DateTime<Utc>,
    },

    /// A rate-limit window was exhausted.
    RateLimited {
        identifier: String,
        timestamp: DateTime<Utc>,
    },

    /// A security log was assembled and shipped.
    SecurityLogged {
        log_id: String,
        action: SecurityAction,
        outcome: DeliveryOutcome,
    },

    /// An OAuth popup handshake finished.
    HandshakeResolved {
        provider: OAuthProvider,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A trait for handling events emitted by the event bus
///
/// # Examples
///
/// ```
/// # use vigil_core::events::{Event, EventHandler};
/// # use vigil_core::error::EventError;
/// # use async_trait::async_trait;
/// struct AlertOnBlock;
///
/// #[async_trait]
/// impl EventHandler for AlertOnBlock {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         if let Event::IpBlocked { ip_address, .. } = event {
///             println!("blocked {ip_address}");
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that fans events out to registered handlers
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first error
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }

    /// Emit an event and log, rather than return, any handler failure.
    ///
    /// Guard services use this so an observer can never change a guard decision.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.emit(&event).await {
            tracing::warn!(error = %e, ?event, "Event handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringEventHandler;

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::HandlerError("sink offline".into()))
        }
    }

    fn blocked_event() -> Event {
        Event::IpBlocked {
            ip_address: "10.0.0.50".to_string(),
            blocked_until: Utc::now(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();
        event_bus
            .emit(&blocked_event())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(CountingHandler {
                count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(CountingHandler {
                count: count2.clone(),
            }))
            .await;

        event_bus.emit(&blocked_event()).await.unwrap();

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        let result = event_bus.emit(&blocked_event()).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
    }

    #[tokio::test]
    async fn test_publish_swallows_handler_errors() {
        let event_bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        event_bus.register(Arc::new(ErroringEventHandler)).await;
        event_bus
            .register(Arc::new(CountingHandler {
                count: count.clone(),
            }))
            .await;

        // Does not panic or return an error; the failing handler stops the fan-out.
        event_bus.publish(blocked_event()).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
