use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use vigil::{GuardError, VigilError};

#[derive(Debug, Error)]
pub enum GuardHttpError {
    /// The client IP is on the block list
    #[error("{message}")]
    Blocked {
        message: String,
        retry_after_seconds: Option<i64>,
    },

    #[error("{0}")]
    TooManyAttempts(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<VigilError> for GuardHttpError {
    fn from(err: VigilError) -> Self {
        match err {
            VigilError::Guard(e @ GuardError::IpBlocked) => GuardHttpError::Blocked {
                message: e.to_string(),
                retry_after_seconds: None,
            },
            VigilError::Guard(e @ GuardError::TooManyAttempts) => {
                GuardHttpError::TooManyAttempts(e.to_string())
            }
            VigilError::Guard(e @ GuardError::RateLimited(_)) => {
                GuardHttpError::RateLimited(e.to_string())
            }
            VigilError::Handshake(e) => GuardHttpError::BadRequest(e.to_string()),
            VigilError::ValidationError(msg) => GuardHttpError::BadRequest(msg),
            VigilError::StorageError(msg) => GuardHttpError::InternalError(msg),
        }
    }
}

impl IntoResponse for GuardHttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            GuardHttpError::Blocked { .. } => StatusCode::FORBIDDEN,
            GuardHttpError::TooManyAttempts(_) | GuardHttpError::RateLimited(_) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            GuardHttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GuardHttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GuardHttpError::InternalError(msg) => {
                tracing::error!(error = %msg, "Guard request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let retry_after = match &self {
            GuardHttpError::Blocked {
                retry_after_seconds: Some(seconds),
                ..
            } => HeaderValue::from_str(&seconds.to_string()).ok(),
            _ => None,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        let mut response = (status, body).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, GuardHttpError>;
