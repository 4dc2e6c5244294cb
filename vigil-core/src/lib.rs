//! Core functionality for the vigil project
//!
//! This crate contains the client-side security guard: login-attempt tracking,
//! IP blocking, rate limiting, security event logging with local fallback,
//! device fingerprinting, session token checks and the popup sign-in handshake.
//!
//! Storage is abstracted behind the [`repositories::RepositoryProvider`] trait
//! so the services work against the in-memory backend or a persistent one.
//!
//! Most applications use the `vigil` facade crate, which wires these services
//! together. See [`SecurityConfig`] for the tunable policy.
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod id;
pub mod oauth;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod suspicious;
pub mod token;
pub mod transport;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use config::{LookupFallback, SecurityConfig};
pub use error::{
    Error, EventError, GuardError, HandshakeError, StorageError, TransportError, ValidationError,
};
pub use events::{DeliveryOutcome, Event, EventBus, EventHandler, UnblockReason};
pub use fingerprint::{DeviceProbe, StaticDeviceProbe, WebGlProbe, generate_device_fingerprint};
pub use storage::{BlockedIp, Location, LoginAttempt, NewSecurityLog, SecurityAction, SecurityLog};
pub use suspicious::{ActivityContext, SuspiciousActivityDetector, detect_suspicious_activity};
pub use token::validate_session_token;
pub use transport::{OfflineTransport, ReqwestTransport, SecurityTransport};
