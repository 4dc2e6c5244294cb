//! Heuristic flagging of tracked actions.

use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;

/// Action substrings that are always suspicious.
pub const SUSPICIOUS_PATTERNS: [&str; 6] = [
    "rapid_requests",
    "invalid_tokens",
    "sql_injection_attempt",
    "xss_attempt",
    "unusual_user_agent",
    "multiple_failed_logins",
];

/// Extra details reported alongside a tracked action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityContext {
    /// Recent failed logins for the same client
    #[serde(default)]
    pub recent_attempts: u32,
    /// Requests seen from the client in the current window
    #[serde(default)]
    pub request_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspiciousActivityDetector {
    failed_login_threshold: u32,
    request_threshold: u32,
}

impl Default for SuspiciousActivityDetector {
    fn default() -> Self {
        Self::from_config(&SecurityConfig::default())
    }
}

impl SuspiciousActivityDetector {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            failed_login_threshold: config.suspicious_failed_login_threshold,
            request_threshold: config.suspicious_request_threshold,
        }
    }

    /// Flag an action as suspicious.
    ///
    /// Failed logins are judged by recent attempts, request actions by request
    /// count, and anything else by the fixed pattern list.
    pub fn is_suspicious(&self, action: &str, context: &ActivityContext) -> bool {
        if action.contains("failed_login") {
            return context.recent_attempts > self.failed_login_threshold;
        }

        if action.contains("request") {
            if let Some(count) = context.request_count.filter(|count| *count > 0) {
                return count > self.request_threshold;
            }
        }

        SUSPICIOUS_PATTERNS
            .iter()
            .any(|pattern| action.contains(pattern))
    }
}

/// [`SuspiciousActivityDetector::is_suspicious`] with the default thresholds.
pub fn detect_suspicious_activity(action: &str, context: &ActivityContext) -> bool {
    SuspiciousActivityDetector::default().is_suspicious(action, context)
}
