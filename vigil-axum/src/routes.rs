use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use vigil::{SecurityLog, StaticDeviceProbe, Vigil, VigilError};
use vigil_core::{error::utilities::RequiredFieldExt, repositories::RepositoryProvider};

use crate::{
    error::{GuardHttpError, Result},
    middleware::{
        AdminState, GuardState, RateLimitState, rate_limit_middleware, require_admin_token,
        security_header_audit_middleware,
    },
    types::*,
};

/// Default page size for `GET /api/security/logs`.
const DEFAULT_LOG_LIMIT: usize = 100;

/// Options for [`create_router`], normally set through the route builder.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Requests admitted per client IP and path in each window
    pub rate_limit: Option<u32>,
    /// Proxies whose `X-Forwarded-For` entries are believed
    pub trusted_proxies: TrustedProxies,
    /// Bearer token for `DELETE /ip/{ip}/blocked`; the route is absent without one
    pub admin_token: Option<String>,
    /// Attach a [`SecurityHeaderAudit`] to every response
    pub header_audit: bool,
}

pub fn create_router<R>(vigil: Arc<Vigil<R>>, options: RouterOptions) -> Router
where
    R: RepositoryProvider + 'static,
{
    let state = GuardState {
        vigil: vigil.clone(),
    };

    let mut blocked_route = get(block_status_handler::<R>);
    if let Some(token) = options.admin_token {
        blocked_route = blocked_route.merge(delete(unblock_handler::<R>).route_layer(
            axum::middleware::from_fn_with_state(AdminState::new(token), require_admin_token),
        ));
    }

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/security/log/", post(ingest_log_handler))
        .route("/api/security/logs", get(list_logs_handler))
        .route("/login/attempt", post(login_attempt_handler))
        .route("/ip/{ip}/blocked", blocked_route)
        .route("/fingerprint", post(fingerprint_handler))
        .with_state(state);

    if let Some(max_requests) = options.rate_limit {
        router = router.layer(axum::middleware::from_fn_with_state(
            RateLimitState {
                vigil,
                max_requests,
            },
            rate_limit_middleware::<R>,
        ));
    }

    if options.header_audit {
        router = router.layer(axum::middleware::from_fn(security_header_audit_middleware));
    }

    // Outermost, so every extractor below sees the proxy list.
    router.layer(Extension(options.trusted_proxies))
}

async fn health_handler<R>(State(state): State<GuardState<R>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .vigil
        .health_check()
        .await
        .map_err(|e| GuardHttpError::InternalError(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn ingest_log_handler<R>(
    State(state): State<GuardState<R>>,
    Json(log): Json<SecurityLog>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let log = state.vigil.ingest_log(log).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn list_logs_handler<R>(
    State(state): State<GuardState<R>>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let logs = state.vigil.recent_audit_logs(limit).await?;
    Ok(Json(logs))
}

async fn login_attempt_handler<R>(
    State(state): State<GuardState<R>>,
    connection: ConnectionInfo,
    Json(body): Json<LoginAttemptRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let email = body
        .email
        .as_str()
        .require_field("email")
        .map_err(|e| GuardHttpError::BadRequest(e.to_string()))?;

    let ip = connection.ip_or_unknown();
    match state
        .vigil
        .validate_login(Some(ip), connection.user_agent.as_deref(), email, body.success)
        .await
    {
        Ok(()) => Ok(Json(LoginAttemptResponse { allowed: true })),
        Err(VigilError::Guard(guard)) => {
            tracing::info!(ip = %ip, error = %guard, "Login attempt refused");
            let mut error = GuardHttpError::from(VigilError::Guard(guard));
            if let GuardHttpError::Blocked {
                retry_after_seconds,
                ..
            } = &mut error
            {
                *retry_after_seconds = state.vigil.retry_after_seconds(ip).await?;
            }
            Err(error)
        }
        Err(e) => Err(e.into()),
    }
}

async fn block_status_handler<R>(
    State(state): State<GuardState<R>>,
    Path(ip): Path<String>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let blocked_until = state.vigil.blocked_until(&ip).await?;
    Ok(Json(BlockStatusResponse {
        ip_address: ip,
        blocked: blocked_until.is_some(),
        blocked_until,
    }))
}

async fn unblock_handler<R>(
    State(state): State<GuardState<R>>,
    Path(ip): Path<String>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let unblocked = state.vigil.unblock_ip(&ip).await?;
    Ok(Json(UnblockResponse {
        ip_address: ip,
        unblocked,
    }))
}

async fn fingerprint_handler<R>(
    State(state): State<GuardState<R>>,
    Json(probe): Json<StaticDeviceProbe>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    Ok(Json(FingerprintResponse {
        fingerprint: state.vigil.device_fingerprint(&probe),
    }))
}
