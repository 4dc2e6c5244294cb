//! Popup windows opened for the sign-in handshake.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::{error::HandshakeError, oauth::OAuthProvider};

static NEXT_POPUP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a popup window, compared against the source of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PopupId(u64);

impl PopupId {
    /// A process-unique id.
    pub fn next() -> Self {
        Self(NEXT_POPUP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PopupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "popup-{}", self.0)
    }
}

/// Position and size of the window opening the popup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenerGeometry {
    pub screen_x: f64,
    pub screen_y: f64,
    pub outer_width: f64,
    pub outer_height: f64,
}

impl Default for OpenerGeometry {
    fn default() -> Self {
        Self {
            screen_x: 0.0,
            screen_y: 0.0,
            outer_width: 1280.0,
            outer_height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
    pub left: f64,
    pub top: f64,
    pub scrollbars: bool,
    pub resizable: bool,
}

impl PopupFeatures {
    /// Center horizontally on the opener and sit slightly above its vertical center.
    pub fn centered(opener: &OpenerGeometry, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            left: opener.screen_x + (opener.outer_width - f64::from(width)) / 2.0,
            top: opener.screen_y + (opener.outer_height - f64::from(height)) / 2.5,
            scrollbars: true,
            resizable: true,
        }
    }

    /// The `window.open` feature string.
    pub fn to_feature_string(&self) -> String {
        let flag = |on: bool| if on { "yes" } else { "no" };
        format!(
            "width={},height={},left={},top={},scrollbars={},resizable={}",
            self.width,
            self.height,
            self.left,
            self.top,
            flag(self.scrollbars),
            flag(self.resizable)
        )
    }
}

/// A child window the handshake drives.
pub trait PopupWindow: Send + Sync + 'static {
    fn id(&self) -> PopupId;

    /// Replace the window's document.
    fn write_document(&self, html: &str);

    fn is_closed(&self) -> bool;

    fn close(&self);

    /// Bring the window to the front. Returns `false` if the environment refused,
    /// which some popup blockers do instead of refusing to open.
    fn focus(&self) -> bool;
}

/// The environment that can open popups.
pub trait PopupHost: Send + Sync + 'static {
    fn geometry(&self) -> OpenerGeometry;

    /// Open a named popup. `None` means the environment blocked it.
    fn open(&self, name: &str, features: &PopupFeatures) -> Option<Arc<dyn PopupWindow>>;
}

/// Open the sign-in popup for `provider`, centered on the opener.
pub fn create_oauth_popup(
    host: &dyn PopupHost,
    provider: OAuthProvider,
    width: u32,
    height: u32,
) -> Result<Arc<dyn PopupWindow>, HandshakeError> {
    let features = PopupFeatures::centered(&host.geometry(), width, height);
    let popup = host
        .open(&provider.window_name(), &features)
        .ok_or(HandshakeError::PopupBlocked)?;

    if !popup.focus() {
        tracing::debug!(popup = %popup.id(), "Popup refused focus, treating as blocked");
        return Err(HandshakeError::PopupBlocked);
    }

    Ok(popup)
}
