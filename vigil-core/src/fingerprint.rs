//! Device fingerprinting.
//!
//! A fingerprint is an advisory signal built from observable client traits.
//! It is stable for one environment but neither unique nor stable across
//! browser updates, so it must never be used as proof of identity.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Text drawn onto the offscreen canvas before it is read back.
pub const CANVAS_TEXT: &str = "Device fingerprint";

/// Length of a generated fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// Result of probing the WebGL renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebGlProbe {
    Available { vendor: String, renderer: String },
    /// No WebGL context could be created
    Unsupported,
    /// The context exists but querying it failed or was blocked
    Failed,
}

impl WebGlProbe {
    /// The string folded into the fingerprint.
    pub fn signature(&self) -> String {
        match self {
            WebGlProbe::Available { vendor, renderer } => format!("{vendor}-{renderer}"),
            WebGlProbe::Unsupported => "no-webgl".to_string(),
            WebGlProbe::Failed => "webgl-error".to_string(),
        }
    }
}

/// Source of the traits a fingerprint is built from.
pub trait DeviceProbe {
    fn user_agent(&self) -> String;
    fn language(&self) -> String;
    fn platform(&self) -> String;
    /// `"{width}x{height}"`
    fn screen_resolution(&self) -> String;
    /// IANA timezone name, e.g. `Africa/Lagos`
    fn timezone(&self) -> String;
    /// Render `text` to an offscreen canvas and return its data URL.
    fn canvas_data(&self, text: &str) -> String;
    fn webgl(&self) -> WebGlProbe;
}

/// Traits collected elsewhere, typically posted by a browser client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticDeviceProbe {
    pub user_agent: String,
    pub language: String,
    pub platform: String,
    pub screen_resolution: String,
    pub timezone: String,
    /// Canvas data URL rendered by the client
    pub canvas: String,
    pub webgl: WebGlProbe,
}

impl DeviceProbe for StaticDeviceProbe {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn language(&self) -> String {
        self.language.clone()
    }

    fn platform(&self) -> String {
        self.platform.clone()
    }

    fn screen_resolution(&self) -> String {
        self.screen_resolution.clone()
    }

    fn timezone(&self) -> String {
        self.timezone.clone()
    }

    fn canvas_data(&self, _text: &str) -> String {
        self.canvas.clone()
    }

    fn webgl(&self) -> WebGlProbe {
        self.webgl.clone()
    }
}

// Field order is part of the fingerprint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintComponents {
    user_agent: String,
    language: String,
    platform: String,
    screen_resolution: String,
    timezone: String,
    canvas: String,
    webgl: String,
}

/// Build the fingerprint for the environment behind `probe`.
///
/// # Example
///
/// ```rust
/// use vigil_core::fingerprint::{StaticDeviceProbe, WebGlProbe, generate_device_fingerprint};
///
/// let probe = StaticDeviceProbe {
///     user_agent: "Mozilla/5.0".into(),
///     language: "en-NG".into(),
///     platform: "Linux x86_64".into(),
///     screen_resolution: "1920x1080".into(),
///     timezone: "Africa/Lagos".into(),
///     canvas: "data:image/png;base64,AAAA".into(),
///     webgl: WebGlProbe::Unsupported,
/// };
/// let fingerprint = generate_device_fingerprint(&probe);
/// assert_eq!(fingerprint.len(), 32);
/// ```
pub fn generate_device_fingerprint<P: DeviceProbe + ?Sized>(probe: &P) -> String {
    let components = FingerprintComponents {
        user_agent: probe.user_agent(),
        language: probe.language(),
        platform: probe.platform(),
        screen_resolution: probe.screen_resolution(),
        timezone: probe.timezone(),
        canvas: probe.canvas_data(CANVAS_TEXT),
        webgl: probe.webgl().signature(),
    };

    // A struct of strings always serializes.
    let json = serde_json::to_vec(&components).unwrap_or_default();
    let mut encoded = STANDARD.encode(json);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}
