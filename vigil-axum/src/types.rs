use std::{net::IpAddr, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttemptRequest {
    pub email: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttemptResponse {
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatusResponse {
    pub ip_address: String,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnblockResponse {
    pub ip_address: String,
    /// `false` when the IP was not blocked
    pub unblocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintResponse {
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Which of the common security headers a response carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityHeaderAudit {
    pub content_security_policy: bool,
    pub x_frame_options: bool,
    pub x_xss_protection: bool,
    pub x_content_type_options: bool,
    pub strict_transport_security: bool,
}

impl SecurityHeaderAudit {
    pub fn all_present(&self) -> bool {
        self.content_security_policy
            && self.x_frame_options
            && self.x_xss_protection
            && self.x_content_type_options
            && self.strict_transport_security
    }

    /// Names of the headers the response lacks.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.content_security_policy, "content-security-policy"),
            (self.x_frame_options, "x-frame-options"),
            (self.x_xss_protection, "x-xss-protection"),
            (self.x_content_type_options, "x-content-type-options"),
            (self.strict_transport_security, "strict-transport-security"),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, name)| name)
        .collect()
    }
}

/// Reverse proxies whose `X-Forwarded-For` entries are believed.
///
/// Empty by default, in which case the client is always the connecting peer.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl TrustedProxies {
    pub fn new(proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(proxies.into_iter().collect())
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ConnectionInfo {
    /// The client IP, or `"unknown"` when none could be determined.
    pub fn ip_or_unknown(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}
