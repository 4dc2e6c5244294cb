//! Popup-based social sign-in.
//!
//! The opener opens a named popup, writes a consent page into it and waits on
//! its [`MessageBus`] for the page to report back. [`OAuthSignIn`] wraps the
//! whole exchange and turns a successful profile into an [`OAuthSession`].

pub mod consent;
pub mod handshake;
pub mod message;
pub mod popup;
pub mod provider;
pub mod sign_in;
pub mod simulated;

pub use handshake::{
    HandshakeConfig, HandshakeOutcome, HandshakeState, OAuthHandshake, OAuthResult,
    POPUP_CLOSED_BY_USER,
};
pub use message::{HandshakeMessage, MessageBus, MessageEvent, OAuthProfile};
pub use popup::{
    OpenerGeometry, PopupFeatures, PopupHost, PopupId, PopupWindow, create_oauth_popup,
};
pub use provider::OAuthProvider;
pub use sign_in::{OAuthSession, OAuthSignIn, OAuthUser};
pub use simulated::{SimulatedPopup, SimulatedPopupHost, UserDecision};
