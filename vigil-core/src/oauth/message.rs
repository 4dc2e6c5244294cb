//! Cross-window messages exchanged between the popup and its opener.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::oauth::{OAuthProvider, PopupId};

/// Profile returned by the identity provider on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthProfile {
    pub email: String,
    pub name: String,
    pub picture: String,
    pub id: String,
}

/// Payloads the consent page posts back.
///
/// ```json
/// {"type": "oauth_success", "provider": "google", "data": {"email": "...", "name": "...", "picture": "...", "id": "..."}}
/// {"type": "oauth_error", "error": "User cancelled authorization"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandshakeMessage {
    OauthSuccess {
        provider: OAuthProvider,
        data: OAuthProfile,
    },
    OauthError {
        error: String,
    },
}

/// A message delivered to the opener, tagged with the window that sent it.
///
/// `data` stays untyped: any window can post anything, and the handshake only
/// reacts to payloads it recognises from the popup it opened.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub source: PopupId,
    pub data: serde_json::Value,
}

impl MessageEvent {
    pub fn new(source: PopupId, message: &HandshakeMessage) -> Self {
        Self {
            source,
            // Enum of strings always serializes.
            data: serde_json::to_value(message).unwrap_or_default(),
        }
    }
}

const MESSAGE_BUS_CAPACITY: usize = 32;

/// The opener's message event target.
#[derive(Debug, Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<MessageEvent>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(MESSAGE_BUS_CAPACITY);
        Self { sender }
    }

    /// Deliver a message to every current listener. Returns how many received it.
    pub fn post(&self, event: MessageEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
