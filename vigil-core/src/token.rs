//! Advisory expiry check for session tokens.
//!
//! The signature is NOT verified. This only answers "has the token the client
//! holds already expired?" so a UI can skip a doomed request; the backend stays
//! the authority on whether a token is valid.

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: f64,
}

fn expiry_only_validation() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

/// Whether the token's `exp` claim lies after `now`.
///
/// Malformed tokens and tokens without `exp` are reported as expired.
pub fn validate_session_token(token: &str, now: DateTime<Utc>) -> bool {
    let claims =
        match decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &expiry_only_validation()) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting malformed session token");
                return false;
            }
        };

    let now_secs = now.timestamp_millis() as f64 / 1000.0;
    claims.exp > now_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    fn token_expiring_at(exp: DateTime<Utc>) -> String {
        encode(
            &Header::default(),
            &Claims {
                sub: "42".to_string(),
                exp: exp.timestamp(),
            },
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_unexpired_token_is_valid_without_the_key() {
        let now = Utc::now();
        let token = token_expiring_at(now + Duration::hours(1));
        assert!(validate_session_token(&token, now));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let now = Utc::now();
        let token = token_expiring_at(now - Duration::seconds(1));
        assert!(!validate_session_token(&token, now));
    }

    #[test]
    fn test_exp_equal_to_now_is_invalid() {
        let now = DateTime::from_timestamp(1_735_689_600, 0).unwrap();
        let token = token_expiring_at(now);
        assert!(!validate_session_token(&token, now));
    }

    #[test]
    fn test_malformed_tokens_are_invalid() {
        let now = Utc::now();
        assert!(!validate_session_token("", now));
        assert!(!validate_session_token("not-a-jwt", now));
        assert!(!validate_session_token("a.b.c", now));
    }
}
