//! In-process popup host that plays the identity provider.
//!
//! Used for demos and tests: a [`SimulatedPopup`] answers the handshake the
//! same way the consent page does, through the opener's [`MessageBus`].

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::Utc;

use crate::oauth::{
    HandshakeMessage, MessageBus, MessageEvent, OAuthProfile, OAuthProvider, OpenerGeometry,
    PopupFeatures, PopupHost, PopupId, PopupWindow, consent,
};

/// What the simulated user does once the consent page is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDecision {
    /// Press Continue
    Allow,
    /// Press Cancel
    Deny,
    /// Close the window without answering
    Dismiss,
}

pub struct SimulatedPopup {
    id: PopupId,
    provider: OAuthProvider,
    bus: MessageBus,
    decision: Option<UserDecision>,
    consent_delay: Duration,
    accepts_focus: bool,
    closed: AtomicBool,
    document: Mutex<Option<String>>,
}

impl SimulatedPopup {
    pub fn provider(&self) -> OAuthProvider {
        self.provider
    }

    /// The last document written into the window.
    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|doc| doc.clone())
    }

    /// Press Continue: report success after the consent delay, then close.
    pub fn allow(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let popup = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(popup.consent_delay).await;
            if popup.is_closed() {
                return;
            }
            popup.post(&HandshakeMessage::OauthSuccess {
                provider: popup.provider,
                data: OAuthProfile {
                    email: consent::simulated_email(popup.provider),
                    name: consent::SIMULATED_NAME.to_string(),
                    picture: consent::SIMULATED_PICTURE.to_string(),
                    id: Utc::now().timestamp_millis().to_string(),
                },
            });
            popup.close();
        })
    }

    /// Press Cancel.
    pub fn deny(&self) {
        self.post(&HandshakeMessage::OauthError {
            error: consent::USER_CANCELLED.to_string(),
        });
        self.close();
    }

    /// Close the window without answering.
    pub fn dismiss(&self) {
        self.close();
    }

    /// Post an arbitrary message to the opener as this window.
    pub fn post(&self, message: &HandshakeMessage) -> usize {
        self.bus.post(MessageEvent::new(self.id, message))
    }
}

impl PopupWindow for SimulatedPopup {
    fn id(&self) -> PopupId {
        self.id
    }

    fn write_document(&self, html: &str) {
        if let Ok(mut document) = self.document.lock() {
            *document = Some(html.to_string());
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn focus(&self) -> bool {
        self.accepts_focus
    }
}

/// Wraps a [`SimulatedPopup`] so that writing the consent page triggers the
/// configured [`UserDecision`].
struct DecidingPopup {
    inner: Arc<SimulatedPopup>,
}

impl PopupWindow for DecidingPopup {
    fn id(&self) -> PopupId {
        self.inner.id
    }

    fn write_document(&self, html: &str) {
        self.inner.write_document(html);
        match self.inner.decision {
            Some(UserDecision::Allow) => {
                self.inner.allow();
            }
            Some(UserDecision::Deny) => self.inner.deny(),
            Some(UserDecision::Dismiss) => self.inner.dismiss(),
            None => {}
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn close(&self) {
        self.inner.close();
    }

    fn focus(&self) -> bool {
        self.inner.focus()
    }
}

struct OpenedPopup {
    name: String,
    features: PopupFeatures,
    popup: Arc<SimulatedPopup>,
}

pub struct SimulatedPopupHost {
    bus: MessageBus,
    geometry: OpenerGeometry,
    blocks_popups: bool,
    popups_accept_focus: bool,
    decision: Option<UserDecision>,
    consent_delay: Duration,
    opened: Mutex<Vec<OpenedPopup>>,
}

impl SimulatedPopupHost {
    /// A host whose popups wait for [`SimulatedPopup::allow`], `deny` or `dismiss`.
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            geometry: OpenerGeometry::default(),
            blocks_popups: false,
            popups_accept_focus: true,
            decision: None,
            consent_delay: Duration::from_secs(2),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Answer every consent page with `decision` as soon as it is shown.
    pub fn with_decision(mut self, decision: UserDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_geometry(mut self, geometry: OpenerGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_consent_delay(mut self, consent_delay: Duration) -> Self {
        self.consent_delay = consent_delay;
        self
    }

    /// Refuse to open any popup.
    pub fn blocking_popups(mut self) -> Self {
        self.blocks_popups = true;
        self
    }

    /// Open popups but refuse to focus them.
    pub fn refusing_focus(mut self) -> Self {
        self.popups_accept_focus = false;
        self
    }

    pub fn last_opened(&self) -> Option<Arc<SimulatedPopup>> {
        self.opened
            .lock()
            .ok()
            .and_then(|opened| opened.last().map(|o| Arc::clone(&o.popup)))
    }

    /// Name and features of the most recent `open` call that succeeded.
    pub fn last_request(&self) -> Option<(String, PopupFeatures)> {
        self.opened
            .lock()
            .ok()
            .and_then(|opened| opened.last().map(|o| (o.name.clone(), o.features.clone())))
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().map(|opened| opened.len()).unwrap_or(0)
    }
}

impl PopupHost for SimulatedPopupHost {
    fn geometry(&self) -> OpenerGeometry {
        self.geometry
    }

    fn open(&self, name: &str, features: &PopupFeatures) -> Option<Arc<dyn PopupWindow>> {
        if self.blocks_popups {
            return None;
        }

        let provider = if name.starts_with(OAuthProvider::Facebook.as_str()) {
            OAuthProvider::Facebook
        } else {
            OAuthProvider::Google
        };

        let popup = Arc::new(SimulatedPopup {
            id: PopupId::next(),
            provider,
            bus: self.bus.clone(),
            decision: self.decision,
            consent_delay: self.consent_delay,
            accepts_focus: self.popups_accept_focus,
            closed: AtomicBool::new(false),
            document: Mutex::new(None),
        });

        if let Ok(mut opened) = self.opened.lock() {
            opened.push(OpenedPopup {
                name: name.to_string(),
                features: features.clone(),
                popup: Arc::clone(&popup),
            });
        }

        Some(Arc::new(DecidingPopup { inner: popup }))
    }
}
