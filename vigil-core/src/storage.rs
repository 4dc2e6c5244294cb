//! Records produced and persisted by the guard services.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse geographic metadata attached to a security log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
    pub region: String,
}

impl Location {
    pub fn new(country: &str, city: &str, region: &str) -> Self {
        Self {
            country: country.to_string(),
            city: city.to_string(),
            region: region.to_string(),
        }
    }
}

/// The action a security log describes.
///
/// Serialized as the bare action string (`"IP_BLOCKED"`, `"login_failed"`, ...)
/// so the backend sees the same values the browser client always sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SecurityAction {
    IpBlocked,
    LoginSuccess,
    LoginFailed,
    OAuthSuccess,
    RateLimited,
    Unknown,
    Custom(String),
}

impl SecurityAction {
    pub fn as_str(&self) -> &str {
        match self {
            SecurityAction::IpBlocked => "IP_BLOCKED",
            SecurityAction::LoginSuccess => "login_success",
            SecurityAction::LoginFailed => "login_failed",
            SecurityAction::OAuthSuccess => "oauth_success",
            SecurityAction::RateLimited => "rate_limited",
            SecurityAction::Unknown => "UNKNOWN",
            SecurityAction::Custom(action) => action,
        }
    }
}

impl From<&str> for SecurityAction {
    fn from(action: &str) -> Self {
        match action {
            "IP_BLOCKED" => SecurityAction::IpBlocked,
            "login_success" => SecurityAction::LoginSuccess,
            "login_failed" => SecurityAction::LoginFailed,
            "oauth_success" => SecurityAction::OAuthSuccess,
            "rate_limited" => SecurityAction::RateLimited,
            "UNKNOWN" | "" => SecurityAction::Unknown,
            other => SecurityAction::Custom(other.to_string()),
        }
    }
}

impl From<String> for SecurityAction {
    fn from(action: String) -> Self {
        SecurityAction::from(action.as_str())
    }
}

impl From<SecurityAction> for String {
    fn from(action: SecurityAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for SecurityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully assembled security log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLog {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub action: SecurityAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub suspicious: bool,
    #[serde(default)]
    pub blocked: bool,
}

/// A partial security log; anything left unset is filled in by the logger.
///
/// # Example
///
/// ```rust
/// use vigil_core::storage::{NewSecurityLog, SecurityAction};
///
/// let partial = NewSecurityLog::builder()
///     .action(SecurityAction::LoginFailed)
///     .email("jane@example.com")
///     .suspicious(true)
///     .build();
/// assert_eq!(partial.email.as_deref(), Some("jane@example.com"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSecurityLog {
    pub id: Option<String>,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: Option<SecurityAction>,
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub suspicious: Option<bool>,
    pub blocked: Option<bool>,
}

impl NewSecurityLog {
    pub fn builder() -> NewSecurityLogBuilder {
        NewSecurityLogBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct NewSecurityLogBuilder {
    inner: NewSecurityLog,
}

impl NewSecurityLogBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.inner.id = Some(id.into());
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.inner.user_id = Some(user_id);
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.inner.email = Some(email.into());
        self
    }

    pub fn maybe_email(mut self, email: Option<String>) -> Self {
        self.inner.email = email;
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.inner.ip_address = Some(ip_address.into());
        self
    }

    pub fn maybe_ip_address(mut self, ip_address: Option<String>) -> Self {
        self.inner.ip_address = ip_address;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.inner.user_agent = Some(user_agent.into());
        self
    }

    pub fn maybe_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.inner.user_agent = user_agent;
        self
    }

    pub fn action(mut self, action: impl Into<SecurityAction>) -> Self {
        self.inner.action = Some(action.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.inner.timestamp = Some(timestamp);
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.inner.location = Some(location);
        self
    }

    pub fn suspicious(mut self, suspicious: bool) -> Self {
        self.inner.suspicious = Some(suspicious);
        self
    }

    pub fn blocked(mut self, blocked: bool) -> Self {
        self.inner.blocked = Some(blocked);
        self
    }

    pub fn build(self) -> NewSecurityLog {
        self.inner
    }
}

/// One login attempt as seen by the attempt tracker. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub ip_address: String,
    pub email: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// An entry in the block list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedIp {
    pub ip_address: String,
    pub blocked_at: DateTime<Utc>,
    pub blocked_until: DateTime<Utc>,
}

impl BlockedIp {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until > now
    }

    /// Seconds until the block lifts, if it is still active.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.is_active_at(now)
            .then(|| (self.blocked_until - now).num_seconds())
    }
}
