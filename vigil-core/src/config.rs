//! Configuration for the guard services.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What the resolver should report when the real lookup is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFallback {
    /// Pick a plausible placeholder from a fixed pool. Useful offline and in demos.
    #[default]
    Mock,
    /// Report the value as unknown so lookup outages stay visible.
    Unknown,
}

/// Configuration for rate limiting, login tracking, IP blocking and security logging.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use vigil_core::SecurityConfig;
///
/// let config = SecurityConfig::default()
///     .with_max_login_attempts(3)
///     .with_block_duration(Duration::minutes(30));
/// assert_eq!(config.max_login_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Failed attempts inside `attempt_window` that trigger an IP block
    pub max_login_attempts: u32,
    /// Sliding window over which login attempts are retained
    #[serde(with = "millis")]
    pub attempt_window: Duration,
    /// How long an IP stays blocked
    #[serde(with = "millis")]
    pub block_duration: Duration,
    /// Default request budget per rate-limit window
    pub rate_limit_max_requests: u32,
    /// Default fixed rate-limit window
    #[serde(with = "millis")]
    pub rate_limit_window: Duration,
    /// Capacity of the local fallback log list (oldest evicted first)
    pub local_log_capacity: usize,
    /// Capacity of the server-side audit log
    pub audit_log_capacity: usize,
    /// Base URL of the backend that receives security logs
    pub api_base: String,
    /// Endpoint used for best-effort public IP discovery
    pub ip_lookup_url: String,
    pub lookup_fallback: LookupFallback,
    /// User agent recorded on events that do not carry one
    pub user_agent: String,
    /// `failed_login` actions with more recent attempts than this are suspicious
    pub suspicious_failed_login_threshold: u32,
    /// `request` actions with a higher request count than this are suspicious
    pub suspicious_request_threshold: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            attempt_window: Duration::hours(1),
            block_duration: Duration::minutes(15),
            rate_limit_max_requests: 100,
            rate_limit_window: Duration::milliseconds(60_000),
            local_log_capacity: 100,
            audit_log_capacity: 10_000,
            api_base: "https://prowebnigeria.pythonanywhere.com".to_string(),
            ip_lookup_url: "https://api.ipify.org?format=json".to_string(),
            lookup_fallback: LookupFallback::Mock,
            user_agent: format!("vigil/{}", env!("CARGO_PKG_VERSION")),
            suspicious_failed_login_threshold: 3,
            suspicious_request_threshold: 100,
        }
    }
}

impl SecurityConfig {
    /// Build a configuration from `VIGIL_*` environment variables, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();

        if let Ok(api_base) = std::env::var("VIGIL_API_BASE") {
            config.api_base = api_base;
        }
        if let Ok(url) = std::env::var("VIGIL_IP_LOOKUP_URL") {
            config.ip_lookup_url = url;
        }
        if let Ok(agent) = std::env::var("VIGIL_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Ok(fallback) = std::env::var("VIGIL_LOOKUP_FALLBACK") {
            config.lookup_fallback = match fallback.to_lowercase().as_str() {
                "mock" => LookupFallback::Mock,
                "unknown" => LookupFallback::Unknown,
                other => {
                    return Err(ValidationError::InvalidField(format!(
                        "VIGIL_LOOKUP_FALLBACK={other}"
                    )));
                }
            };
        }
        if let Some(max) = parse_env::<u32>("VIGIL_MAX_LOGIN_ATTEMPTS")? {
            config.max_login_attempts = max;
        }
        if let Some(secs) = parse_env::<i64>("VIGIL_BLOCK_DURATION_SECS")? {
            config.block_duration = Duration::seconds(secs);
        }
        if let Some(max) = parse_env::<u32>("VIGIL_RATE_LIMIT_MAX_REQUESTS")? {
            config.rate_limit_max_requests = max;
        }
        if let Some(ms) = parse_env::<i64>("VIGIL_RATE_LIMIT_WINDOW_MS")? {
            config.rate_limit_window = Duration::milliseconds(ms);
        }

        Ok(config)
    }

    pub fn with_max_login_attempts(mut self, max: u32) -> Self {
        self.max_login_attempts = max;
        self
    }

    pub fn with_attempt_window(mut self, window: Duration) -> Self {
        self.attempt_window = window;
        self
    }

    pub fn with_block_duration(mut self, duration: Duration) -> Self {
        self.block_duration = duration;
        self
    }

    pub fn with_rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.rate_limit_max_requests = max_requests;
        self.rate_limit_window = window;
        self
    }

    pub fn with_local_log_capacity(mut self, capacity: usize) -> Self {
        self.local_log_capacity = capacity;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_ip_lookup_url(mut self, url: impl Into<String>) -> Self {
        self.ip_lookup_url = url.into();
        self
    }

    pub fn with_lookup_fallback(mut self, fallback: LookupFallback) -> Self {
        self.lookup_fallback = fallback;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Full URL of the security log endpoint.
    pub fn log_endpoint(&self) -> String {
        format!("{}/api/security/log/", self.api_base.trim_end_matches('/'))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ValidationError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidField(format!("{name}={raw}"))),
        Err(_) => Ok(None),
    }
}

mod millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::milliseconds(i64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(config.block_duration, Duration::minutes(15));
        assert_eq!(config.attempt_window, Duration::hours(1));
        assert_eq!(config.rate_limit_max_requests, 100);
        assert_eq!(config.rate_limit_window, Duration::seconds(60));
        assert_eq!(config.local_log_capacity, 100);
        assert_eq!(config.lookup_fallback, LookupFallback::Mock);
    }

    #[test]
    fn test_log_endpoint_trims_trailing_slash() {
        let config = SecurityConfig::default().with_api_base("http://localhost:8000/");
        assert_eq!(
            config.log_endpoint(),
            "http://localhost:8000/api/security/log/"
        );
    }

    #[test]
    fn test_serde_uses_milliseconds() {
        let config = SecurityConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["block_duration"], 900_000);
        assert_eq!(json["rate_limit_window"], 60_000);
        assert_eq!(json["lookup_fallback"], "mock");

        let back: SecurityConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_builder_methods() {
        let config = SecurityConfig::default()
            .with_rate_limit(10, Duration::seconds(1))
            .with_lookup_fallback(LookupFallback::Unknown)
            .with_user_agent("test-agent");
        assert_eq!(config.rate_limit_max_requests, 10);
        assert_eq!(config.rate_limit_window, Duration::seconds(1));
        assert_eq!(config.lookup_fallback, LookupFallback::Unknown);
        assert_eq!(config.user_agent, "test-agent");
    }
}
