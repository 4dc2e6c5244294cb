pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

/// Policy decisions that halt a user-facing flow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("IP address is temporarily blocked due to suspicious activity")]
    IpBlocked,

    #[error("Too many failed login attempts. Please try again later.")]
    TooManyAttempts,

    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("Popup was blocked. Please allow popups for this site and try again.")]
    PopupBlocked,

    /// The user closed the popup or denied consent.
    #[error("{0}")]
    Declined(String),

    #[error("Failed to initialize {0} sign-in")]
    Initialization(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures talking to the backend or to the IP lookup service.
///
/// These never reach the caller of the logger or the resolver; they are
/// degraded into local fallbacks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status code: {0}")]
    Status(u16),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Transport is offline")]
    Offline,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event bus error: {0}")]
    BusError(String),

    #[error("Event handler error: {0}")]
    HandlerError(String),
}

impl Error {
    pub fn is_guard_error(&self) -> bool {
        matches!(self, Error::Guard(_))
    }

    pub fn is_handshake_error(&self) -> bool {
        matches!(self, Error::Handshake(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(ValidationError::InvalidIp(_))
                | Error::Validation(ValidationError::InvalidField(_))
                | Error::Validation(ValidationError::MissingField(_))
        )
    }

    /// The single human-readable string a login or sign-in form should show.
    pub fn user_message(&self) -> String {
        match self {
            Error::Guard(e) => e.to_string(),
            Error::Handshake(e) => e.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}
