//! The popup handshake state machine.
//!
//! ```text
//! Opened -> AwaitingDecision -> Resolved(Success | Denied | Cancelled)
//! ```
//!
//! Two sources can resolve a handshake: a recognised message from the popup,
//! or the poll noticing the popup was closed. Whichever fires first wins. The
//! listener and the poll both live inside [`OAuthHandshake::run`], so they are
//! released on every path and a handshake resolves at most once.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::broadcast::error::RecvError,
    time::{Instant, interval_at},
};

use crate::oauth::{
    HandshakeMessage, MessageBus, OAuthProfile, OAuthProvider, PopupWindow, consent,
};

/// Error reported when the popup closes without a decision.
pub const POPUP_CLOSED_BY_USER: &str = "Popup closed by user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    pub popup_width: u32,
    pub popup_height: u32,
    /// How often the popup is checked for closure
    pub poll_interval: Duration,
    /// Delay the simulated consent page waits before reporting success
    pub consent_delay: Duration,
    /// Application named on the consent page
    pub app_name: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            popup_width: 500,
            popup_height: 600,
            poll_interval: Duration::from_secs(1),
            consent_delay: Duration::from_secs(2),
            app_name: "Vigil".to_string(),
        }
    }
}

impl HandshakeConfig {
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_consent_delay(mut self, consent_delay: Duration) -> Self {
        self.consent_delay = consent_delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Success(OAuthProfile),
    /// The provider page reported an error, usually the user pressing Cancel
    Denied { error: String },
    /// The popup closed without reporting anything
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Opened,
    AwaitingDecision,
    Resolved(HandshakeOutcome),
}

/// The flat result handed to sign-in callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OAuthResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            email: None,
            name: None,
            picture: None,
            id: None,
            error: Some(error.into()),
        }
    }
}

impl From<HandshakeOutcome> for OAuthResult {
    fn from(outcome: HandshakeOutcome) -> Self {
        match outcome {
            HandshakeOutcome::Success(profile) => Self {
                success: true,
                email: Some(profile.email),
                name: Some(profile.name),
                picture: Some(profile.picture),
                id: Some(profile.id),
                error: None,
            },
            HandshakeOutcome::Denied { error } => Self::failure(error),
            HandshakeOutcome::Cancelled => Self::failure(POPUP_CLOSED_BY_USER),
        }
    }
}

pub struct OAuthHandshake {
    popup: Arc<dyn PopupWindow>,
    provider: OAuthProvider,
    bus: MessageBus,
    config: HandshakeConfig,
    state: HandshakeState,
}

impl OAuthHandshake {
    pub fn new(
        popup: Arc<dyn PopupWindow>,
        provider: OAuthProvider,
        bus: MessageBus,
        config: HandshakeConfig,
    ) -> Self {
        Self {
            popup,
            provider,
            bus,
            config,
            state: HandshakeState::Opened,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn provider(&self) -> OAuthProvider {
        self.provider
    }

    /// Drive the handshake to resolution.
    ///
    /// Calling `run` again after resolution returns the same outcome without
    /// touching the popup.
    pub async fn run(&mut self) -> HandshakeOutcome {
        if let HandshakeState::Resolved(outcome) = &self.state {
            return outcome.clone();
        }

        // Listen before the document exists so no reply can be missed.
        let mut listener = self.bus.subscribe();
        let source = self.popup.id();

        self.popup.write_document(&consent::render_consent_page(
            self.provider,
            &self.config.app_name,
            self.config.consent_delay,
        ));
        self.transition(HandshakeState::AwaitingDecision);

        let period = self.config.poll_interval;
        let mut poll = interval_at(Instant::now() + period, period);
        let mut listening = true;

        let outcome = loop {
            tokio::select! {
                biased;

                received = listener.recv(), if listening => match received {
                    Ok(event) if event.source == source => {
                        match serde_json::from_value::<HandshakeMessage>(event.data) {
                            Ok(HandshakeMessage::OauthSuccess { data, .. }) => {
                                break HandshakeOutcome::Success(data);
                            }
                            Ok(HandshakeMessage::OauthError { error }) => {
                                break HandshakeOutcome::Denied { error };
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, popup = %source, "Ignoring unrecognised popup message");
                            }
                        }
                    }
                    Ok(event) => {
                        tracing::debug!(source = %event.source, popup = %source, "Ignoring message from another window");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, popup = %source, "Handshake listener lagged");
                    }
                    Err(RecvError::Closed) => {
                        listening = false;
                    }
                },
                _ = poll.tick() => {
                    if self.popup.is_closed() {
                        break HandshakeOutcome::Cancelled;
                    }
                }
            }
        };

        drop(listener);
        if !self.popup.is_closed() {
            self.popup.close();
        }

        self.transition(HandshakeState::Resolved(outcome.clone()));
        outcome
    }

    fn transition(&mut self, next: HandshakeState) {
        tracing::debug!(
            provider = %self.provider,
            popup = %self.popup.id(),
            from = ?self.state,
            to = ?next,
            "Handshake transition"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{
        MessageEvent, OpenerGeometry, PopupFeatures, PopupHost, PopupId,
        simulated::{SimulatedPopupHost, UserDecision},
    };

    fn open(host: &SimulatedPopupHost) -> Arc<dyn PopupWindow> {
        let features = PopupFeatures::centered(&OpenerGeometry::default(), 500, 600);
        host.open("google_oauth", &features).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_resolves_success_and_closes_popup() {
        let bus = MessageBus::new();
        let host = SimulatedPopupHost::new(bus.clone()).with_decision(UserDecision::Allow);
        let popup = open(&host);

        let mut handshake =
            OAuthHandshake::new(popup.clone(), OAuthProvider::Google, bus.clone(), HandshakeConfig::default());
        let started = Instant::now();
        let outcome = handshake.run().await;

        let HandshakeOutcome::Success(profile) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(profile.email, "john.doe@gmail.com");
        assert_eq!(profile.name, "John Doe");
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(popup.is_closed());
        assert_eq!(bus.listener_count(), 0);
        assert!(matches!(handshake.state(), HandshakeState::Resolved(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_resolves_with_error() {
        let bus = MessageBus::new();
        let host = SimulatedPopupHost::new(bus.clone()).with_decision(UserDecision::Deny);
        let popup = open(&host);

        let mut handshake =
            OAuthHandshake::new(popup, OAuthProvider::Facebook, bus, HandshakeConfig::default());
        let result = OAuthResult::from(handshake.run().await);

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("User cancelled authorization"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_popup_resolves_within_one_poll() {
        let bus = MessageBus::new();
        let host = SimulatedPopupHost::new(bus.clone()).with_decision(UserDecision::Dismiss);
        let popup = open(&host);

        let mut handshake =
            OAuthHandshake::new(popup, OAuthProvider::Google, bus.clone(), HandshakeConfig::default());
        let started = Instant::now();
        let result = OAuthResult::from(handshake.run().await);

        assert!(started.elapsed() <= Duration::from_secs(1));
        assert_eq!(
            result,
            OAuthResult {
                success: false,
                email: None,
                name: None,
                picture: None,
                id: None,
                error: Some("Popup closed by user".to_string()),
            }
        );
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_from_other_windows_are_ignored() {
        let bus = MessageBus::new();
        let host = SimulatedPopupHost::new(bus.clone());
        let popup = open(&host);
        let simulated = host.last_opened().unwrap();

        let spoofer = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            spoofer.post(MessageEvent::new(
                PopupId::next(),
                &HandshakeMessage::OauthSuccess {
                    provider: OAuthProvider::Google,
                    data: OAuthProfile {
                        email: "attacker@example.com".to_string(),
                        name: "Mallory".to_string(),
                        picture: String::new(),
                        id: "1".to_string(),
                    },
                },
            ));
            // Garbage from the real popup is ignored too.
            spoofer.post(MessageEvent {
                source: simulated.id(),
                data: serde_json::json!({"type": "analytics_ping"}),
            });
            tokio::time::sleep(Duration::from_secs(3)).await;
            simulated.deny();
        });

        let mut handshake =
            OAuthHandshake::new(popup, OAuthProvider::Google, bus, HandshakeConfig::default());
        let outcome = handshake.run().await;

        assert_eq!(
            outcome,
            HandshakeOutcome::Denied {
                error: "User cancelled authorization".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_before_next_poll_wins() {
        let bus = MessageBus::new();
        let host = SimulatedPopupHost::new(bus.clone());
        let popup = open(&host);
        let simulated = host.last_opened().unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            // Posts and closes between the 1s and 2s polls.
            simulated.deny();
        });

        let mut handshake =
            OAuthHandshake::new(popup, OAuthProvider::Google, bus, HandshakeConfig::default());
        assert!(matches!(handshake.run().await, HandshakeOutcome::Denied { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_after_resolution_is_idempotent() {
        let bus = MessageBus::new();
        let host = SimulatedPopupHost::new(bus.clone()).with_decision(UserDecision::Deny);
        let popup = open(&host);

        let mut handshake =
            OAuthHandshake::new(popup, OAuthProvider::Google, bus, HandshakeConfig::default());
        let first = handshake.run().await;
        let second = handshake.run().await;
        assert_eq!(first, second);
    }

    #[test]
    fn test_success_result_shape() {
        let result = OAuthResult::from(HandshakeOutcome::Success(OAuthProfile {
            email: "a@b.com".to_string(),
            name: "John Doe".to_string(),
            picture: "p".to_string(),
            id: "1".to_string(),
        }));
        assert!(result.success);
        assert_eq!(result.email.as_deref(), Some("a@b.com"));
        assert_eq!(result.name.as_deref(), Some("John Doe"));
        assert!(result.error.is_none());
    }
}
