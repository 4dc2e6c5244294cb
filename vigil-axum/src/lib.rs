//! # Vigil Axum Integration
//!
//! This crate provides Axum routes and middleware for the Vigil login guard.
//!
//! ## Routes
//!
//! - `GET /health`
//! - `POST /api/security/log/`: ingest a security log shipped by a client
//! - `GET /api/security/logs?limit=`: most recent ingested logs
//! - `POST /login/attempt`: gate a login attempt from the connecting IP
//! - `GET /ip/{ip}/blocked`: inspect a block
//! - `DELETE /ip/{ip}/blocked`: lift a block, only mounted with
//!   [`GuardRouterBuilder::with_admin_token`] and refused without that bearer token
//! - `POST /fingerprint`: fingerprint posted device traits
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//! use vigil::VigilBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vigil = Arc::new(VigilBuilder::new().with_in_memory().build().await?);
//!
//!     let app = axum::Router::new().merge(
//!         vigil_axum::routes(vigil)
//!             .with_rate_limit(60)
//!             .with_trusted_proxies(["10.0.0.1".parse::<std::net::IpAddr>()?])
//!             .build(),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! Serve with connect info: the client is the connecting peer. `X-Forwarded-For`
//! is only read when the peer is one of the trusted proxies, and then the
//! rightmost hop that is not a trusted proxy is taken.

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{GuardHttpError, Result};
pub use middleware::{
    AdminState, GuardState, RateLimitState, audit_security_headers, rate_limit_middleware,
    require_admin_token, security_header_audit_middleware,
};
pub use routes::{RouterOptions, create_router};
pub use types::{
    BlockStatusResponse, ConnectionInfo, FingerprintResponse, HealthResponse,
    LoginAttemptRequest, LoginAttemptResponse, LogsQuery, SecurityHeaderAudit, TrustedProxies,
    UnblockResponse,
};

use axum::Router;
use std::{net::IpAddr, sync::Arc};
use vigil::Vigil;
use vigil_core::repositories::RepositoryProvider;

/// Create guard routes for your Axum application.
///
/// # Example
///
/// ```rust,ignore
/// let guard_routes = vigil_axum::routes(vigil).build();
/// let app = Router::new().merge(guard_routes);
/// ```
pub fn routes<R>(vigil: Arc<Vigil<R>>) -> GuardRouterBuilder<R>
where
    R: RepositoryProvider + 'static,
{
    GuardRouterBuilder {
        vigil,
        options: RouterOptions::default(),
    }
}

/// Builder for configuring guard routes
pub struct GuardRouterBuilder<R: RepositoryProvider> {
    vigil: Arc<Vigil<R>>,
    options: RouterOptions,
}

impl<R: RepositoryProvider + 'static> GuardRouterBuilder<R> {
    /// Admit at most `max_requests` per client IP and path in each rate-limit window.
    pub fn with_rate_limit(mut self, max_requests: u32) -> Self {
        self.options.rate_limit = Some(max_requests);
        self
    }

    /// Believe `X-Forwarded-For` from these peers.
    pub fn with_trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.options.trusted_proxies = TrustedProxies::new(proxies);
        self
    }

    /// Mount `DELETE /ip/{ip}/blocked`, guarded by `Authorization: Bearer <token>`.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.options.admin_token = Some(token.into());
        self
    }

    /// Audit responses for security headers, see [`security_header_audit_middleware`].
    pub fn with_header_audit(mut self) -> Self {
        self.options.header_audit = true;
        self
    }

    /// Build the router with the configured options
    pub fn build(self) -> Router {
        create_router(self.vigil, self.options)
    }
}

impl<R: RepositoryProvider + 'static> From<GuardRouterBuilder<R>> for Router {
    fn from(builder: GuardRouterBuilder<R>) -> Self {
        builder.build()
    }
}
