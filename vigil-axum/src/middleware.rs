use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use vigil::Vigil;
use vigil_core::repositories::RepositoryProvider;

use crate::{
    error::GuardHttpError,
    types::{ConnectionInfo, SecurityHeaderAudit},
};

pub struct GuardState<R: RepositoryProvider> {
    pub vigil: Arc<Vigil<R>>,
}

impl<R: RepositoryProvider> Clone for GuardState<R> {
    fn clone(&self) -> Self {
        Self {
            vigil: self.vigil.clone(),
        }
    }
}

/// State for [`rate_limit_middleware`].
pub struct RateLimitState<R: RepositoryProvider> {
    pub vigil: Arc<Vigil<R>>,
    /// Requests admitted per client and path in each window
    pub max_requests: u32,
}

impl<R: RepositoryProvider> Clone for RateLimitState<R> {
    fn clone(&self) -> Self {
        Self {
            vigil: self.vigil.clone(),
            max_requests: self.max_requests,
        }
    }
}

/// Refuse requests once a client exceeds its budget for a path.
///
/// Each client IP and request path pair gets its own fixed window, sized by
/// the Vigil configuration.
pub async fn rate_limit_middleware<R>(
    State(state): State<RateLimitState<R>>,
    connection: ConnectionInfo,
    request: Request,
    next: Next,
) -> Result<Response, GuardHttpError>
where
    R: RepositoryProvider,
{
    let path = request.uri().path().to_string();
    let ip = connection.ip_or_unknown();

    if !state
        .vigil
        .check_rate_limit(Some(ip), &path, state.max_requests)
        .await
    {
        tracing::debug!(ip = %ip, path = %path, "Request rate limited");
        return Err(GuardHttpError::RateLimited(format!(
            "Rate limit exceeded for {path}"
        )));
    }

    Ok(next.run(request).await)
}

/// State for [`require_admin_token`].
#[derive(Clone)]
pub struct AdminState {
    token: Arc<str>,
}

impl AdminState {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }

    fn accepts(&self, presented: &str) -> bool {
        let expected = self.token.as_bytes();
        let presented = presented.as_bytes();
        presented.len() == expected.len() && bool::from(presented.ct_eq(expected))
    }
}

/// Admit only requests carrying the configured admin bearer token.
pub async fn require_admin_token(
    State(state): State<AdminState>,
    connection: ConnectionInfo,
    request: Request,
    next: Next,
) -> Result<Response, GuardHttpError> {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .is_some_and(|token| state.accepts(token));

    if !authorized {
        tracing::warn!(
            ip = %connection.ip_or_unknown(),
            path = %request.uri().path(),
            "Refused admin request without valid token"
        );
        return Err(GuardHttpError::Unauthorized(
            "Admin token required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

/// Audit every response for the common security headers.
///
/// The [`SecurityHeaderAudit`] is attached to the response extensions so an
/// outer layer can act on it. Responses missing headers are logged.
pub async fn security_header_audit_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let audit = audit_security_headers(response.headers());
    if !audit.all_present() {
        tracing::debug!(
            path = %path,
            missing = ?audit.missing(),
            "Response lacks security headers"
        );
    }
    response.extensions_mut().insert(audit);
    response
}

/// Report which common security headers are present in `headers`.
pub fn audit_security_headers(headers: &HeaderMap) -> SecurityHeaderAudit {
    SecurityHeaderAudit {
        content_security_policy: headers.contains_key("content-security-policy"),
        x_frame_options: headers.contains_key("x-frame-options"),
        x_xss_protection: headers.contains_key("x-xss-protection"),
        x_content_type_options: headers.contains_key("x-content-type-options"),
        strict_transport_security: headers.contains_key("strict-transport-security"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_audit_reports_each_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
        headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));

        let audit = audit_security_headers(&headers);
        assert!(audit.x_frame_options);
        assert!(audit.x_content_type_options);
        assert!(!audit.content_security_policy);
        assert!(!audit.strict_transport_security);
        assert!(!audit.all_present());
    }

    #[test]
    fn test_audit_all_present() {
        let mut headers = HeaderMap::new();
        for name in [
            "content-security-policy",
            "x-frame-options",
            "x-xss-protection",
            "x-content-type-options",
            "strict-transport-security",
        ] {
            headers.insert(name, HeaderValue::from_static("1"));
        }
        assert!(audit_security_headers(&headers).all_present());
        assert!(audit_security_headers(&headers).missing().is_empty());
    }

    #[test]
    fn test_audit_lists_missing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Security-Policy", HeaderValue::from_static("default-src 'self'"));

        assert_eq!(
            audit_security_headers(&headers).missing(),
            vec![
                "x-frame-options",
                "x-xss-protection",
                "x-content-type-options",
                "strict-transport-security",
            ]
        );
    }

    #[test]
    fn test_admin_token_must_match_exactly() {
        let state = AdminState::new("s3cret-admin");
        assert!(state.accepts("s3cret-admin"));
        assert!(!state.accepts("s3cret-admin2"));
        assert!(!state.accepts("s3cret"));
        assert!(!state.accepts(""));
    }
}
