//! Popup sign-in: open, run the handshake, turn the profile into a session.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    error::HandshakeError,
    events::{Event, EventBus},
    oauth::{
        HandshakeConfig, HandshakeOutcome, MessageBus, OAuthHandshake, OAuthProfile,
        OAuthProvider, PopupHost, create_oauth_popup,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthUser {
    pub id: u32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_verified: bool,
    pub provider: OAuthProvider,
    pub avatar: String,
}

/// Tokens and user produced by a successful sign-in.
///
/// The tokens are placeholders minted locally; no provider token exchange
/// takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: OAuthUser,
}

pub struct OAuthSignIn {
    host: Arc<dyn PopupHost>,
    bus: MessageBus,
    config: HandshakeConfig,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl OAuthSignIn {
    pub fn new(
        host: Arc<dyn PopupHost>,
        bus: MessageBus,
        config: HandshakeConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            host,
            bus,
            config,
            clock,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Sign in with `provider` through a popup.
    ///
    /// The error's display text is the message to show the user.
    pub async fn sign_in(&self, provider: OAuthProvider) -> Result<OAuthSession, HandshakeError> {
        let popup = create_oauth_popup(
            self.host.as_ref(),
            provider,
            self.config.popup_width,
            self.config.popup_height,
        )?;

        let mut handshake =
            OAuthHandshake::new(popup, provider, self.bus.clone(), self.config.clone());
        let outcome = handshake.run().await;

        let result = match outcome {
            HandshakeOutcome::Success(profile) => self.session_for(provider, profile),
            HandshakeOutcome::Denied { error } if !error.is_empty() => {
                Err(HandshakeError::Declined(error))
            }
            HandshakeOutcome::Denied { .. } => Err(HandshakeError::Declined(format!(
                "{} sign-in was cancelled",
                provider.display_name()
            ))),
            HandshakeOutcome::Cancelled => Err(HandshakeError::Declined(
                crate::oauth::POPUP_CLOSED_BY_USER.to_string(),
            )),
        };

        match &result {
            Ok(session) => {
                tracing::info!(provider = %provider, email = %session.user.email, "OAuth sign-in succeeded")
            }
            Err(e) => tracing::info!(provider = %provider, error = %e, "OAuth sign-in did not complete"),
        }

        if let Some(event_bus) = &self.event_bus {
            event_bus
                .publish(Event::HandshakeResolved {
                    provider,
                    success: result.is_ok(),
                    timestamp: self.clock.now(),
                })
                .await;
        }

        result
    }

    fn session_for(
        &self,
        provider: OAuthProvider,
        profile: OAuthProfile,
    ) -> Result<OAuthSession, HandshakeError> {
        if profile.email.is_empty() || profile.name.is_empty() {
            return Err(HandshakeError::Initialization(
                provider.display_name().to_string(),
            ));
        }

        let millis = self.clock.now().timestamp_millis();
        let mut names = profile.name.split(' ');
        let first_name = names.next().unwrap_or_default().to_string();
        let last_name = names.next().unwrap_or_default().to_string();

        Ok(OAuthSession {
            access_token: format!("{provider}_token_{millis}"),
            refresh_token: format!("{provider}_refresh_{millis}"),
            user: OAuthUser {
                id: rand::rng().random_range(0..1000),
                email: profile.email,
                first_name,
                last_name,
                is_verified: true,
                provider,
                avatar: profile.picture,
            },
        })
    }
}
