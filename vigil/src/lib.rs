//! # Vigil
//!
//! Vigil guards the sign-in surface of an application: it tracks login
//! attempts, blocks IPs that fail too often, rate limits actions, and ships
//! security events to a logging backend with a local fallback when the backend
//! is unreachable.
//!
//! It also covers the client-side odds and ends that usually travel with
//! those concerns:
//! - Device fingerprinting from collected browser traits
//! - Advisory session token expiry checks
//! - Popup-based social sign-in (Google, Facebook)
//!
//! ## Storage Support
//!
//! - In memory (always available)
//! - SQLite (`sqlite` feature, on by default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil::VigilBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vigil = VigilBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     vigil
//!         .validate_login(Some("203.0.113.7"), Some("Mozilla/5.0"), "jane@example.com", false)
//!         .await?;
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vigil_core::{
    clock::Clock,
    oauth::{HandshakeConfig, MessageBus, OAuthSignIn, PopupHost},
    repositories::{
        AuditLogRepositoryAdapter, BlockListRepositoryAdapter, LocalLogRepositoryAdapter,
    },
    services::{
        AuditLogService, IpBlockService, IpLocationResolver, LoginAttemptTracker, RateLimiter,
        SecurityEventLogger,
    },
};

pub mod builder;

pub use builder::{NoStorage, VigilBuilder, VigilBuilderError, WithStorage};

/// Re-export core types from vigil_core
///
/// These types are commonly used when working with the Vigil API.
pub use vigil_core::{
    ActivityContext, BlockedIp, DeliveryOutcome, DeviceProbe, Event, EventBus, EventHandler,
    GuardError, HandshakeError, Location, LookupFallback, NewSecurityLog,
    OfflineTransport, ReqwestTransport, SecurityAction, SecurityConfig, SecurityLog,
    SecurityTransport, StaticDeviceProbe, SuspiciousActivityDetector, SystemClock, WebGlProbe,
    oauth::{OAuthProvider, OAuthSession, OAuthUser, SimulatedPopupHost, UserDecision},
    repositories::{InMemoryRepositoryProvider, RepositoryProvider},
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use vigil_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

#[cfg(feature = "test-util")]
pub use vigil_core::ManualClock;

/// Errors that can occur when using Vigil.
///
/// Guard and handshake errors display exactly the message a login or sign-in
/// form should show.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// A policy decision stopped the flow
    #[error("{0}")]
    Guard(#[from] GuardError),
    /// Popup sign-in did not complete
    #[error("{0}")]
    Handshake(#[from] HandshakeError),
    /// Invalid input
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<vigil_core::Error> for VigilError {
    fn from(error: vigil_core::Error) -> Self {
        match error {
            vigil_core::Error::Guard(e) => VigilError::Guard(e),
            vigil_core::Error::Handshake(e) => VigilError::Handshake(e),
            vigil_core::Error::Validation(e) => VigilError::ValidationError(e.to_string()),
            other => VigilError::StorageError(other.to_string()),
        }
    }
}

/// Details attached to a tracked user action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAction {
    /// Client IP; resolved through the lookup service when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Client user agent; the configured agent is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub context: ActivityContext,
}

impl TrackedAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn maybe_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_context(mut self, context: ActivityContext) -> Self {
        self.context = context;
        self
    }
}

/// Transport shared by the logger and the resolver.
pub type SharedTransport = Arc<dyn SecurityTransport>;

type Logger<R> = SecurityEventLogger<LocalLogRepositoryAdapter<R>, SharedTransport>;
type IpBlocks<R> =
    IpBlockService<BlockListRepositoryAdapter<R>, LocalLogRepositoryAdapter<R>, SharedTransport>;
type LoginAttempts<R> = LoginAttemptTracker<
    BlockListRepositoryAdapter<R>,
    LocalLogRepositoryAdapter<R>,
    SharedTransport,
>;

/// The guard coordinator that wires the services to one storage backend.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use vigil::{InMemoryRepositoryProvider, SecurityConfig, Vigil};
///
/// # async fn example() -> Result<(), vigil::VigilError> {
/// let vigil = Vigil::new(
///     Arc::new(InMemoryRepositoryProvider::new()),
///     SecurityConfig::default(),
/// )?;
///
/// if !vigil.check_rate_limit(Some("203.0.113.7"), "search", 10).await {
///     println!("slow down");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Vigil<R: RepositoryProvider> {
    repositories: Arc<R>,
    config: SecurityConfig,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    resolver: Arc<IpLocationResolver<SharedTransport>>,
    logger: Arc<Logger<R>>,
    ip_blocks: Arc<IpBlocks<R>>,
    login_attempts: Arc<LoginAttempts<R>>,
    rate_limiter: Arc<RateLimiter>,
    audit: Arc<AuditLogService<AuditLogRepositoryAdapter<R>>>,
    detector: SuspiciousActivityDetector,
    handshake_config: HandshakeConfig,
    message_bus: MessageBus,
}

impl<R: RepositoryProvider> Vigil<R> {
    /// Create a Vigil instance that ships logs over HTTP using the system clock.
    pub fn new(repositories: Arc<R>, config: SecurityConfig) -> Result<Self, VigilError> {
        let transport = ReqwestTransport::new().map_err(vigil_core::Error::from)?;
        Ok(Self::from_parts(
            repositories,
            config,
            Arc::new(transport),
            Arc::new(SystemClock),
            EventBus::new(),
            HandshakeConfig::default(),
        ))
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        config: SecurityConfig,
        transport: SharedTransport,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        handshake_config: HandshakeConfig,
    ) -> Self {
        let transport = Arc::new(transport);
        let local_logs = Arc::new(LocalLogRepositoryAdapter::new(repositories.clone()));

        let resolver = Arc::new(IpLocationResolver::new(transport.clone(), &config));
        let logger = Arc::new(
            SecurityEventLogger::new(
                local_logs,
                transport,
                resolver.clone(),
                clock.clone(),
                &config,
            )
            .with_event_bus(event_bus.clone()),
        );
        let ip_blocks = Arc::new(
            IpBlockService::new(
                Arc::new(BlockListRepositoryAdapter::new(repositories.clone())),
                logger.clone(),
                clock.clone(),
                &config,
            )
            .with_event_bus(event_bus.clone()),
        );
        let login_attempts = Arc::new(
            LoginAttemptTracker::new(ip_blocks.clone(), clock.clone(), &config)
                .with_event_bus(event_bus.clone()),
        );
        let rate_limiter = Arc::new(RateLimiter::new(clock.clone(), &config));
        let audit = Arc::new(AuditLogService::new(
            Arc::new(AuditLogRepositoryAdapter::new(repositories.clone())),
            config.audit_log_capacity,
        ));

        Self {
            repositories,
            detector: SuspiciousActivityDetector::from_config(&config),
            config,
            clock,
            event_bus,
            resolver,
            logger,
            ip_blocks,
            login_attempts,
            rate_limiter,
            audit,
            handshake_config,
            message_bus: MessageBus::new(),
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Register handlers here to observe guard decisions.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// The bus popup sign-in listens on. Popup hosts must post to this bus.
    pub fn message_bus(&self) -> &MessageBus {
        &self.message_bus
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), VigilError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| VigilError::StorageError(e.to_string()))
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), VigilError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| VigilError::StorageError(e.to_string()))
    }

    async fn resolve_ip(&self, ip_address: Option<&str>) -> String {
        match ip_address {
            Some(ip) => ip.to_string(),
            None => self.resolver.client_ip().await,
        }
    }

    /// Gate a login attempt.
    ///
    /// Fails when the IP is already blocked or when this attempt exhausts the
    /// failure budget. Otherwise the attempt is logged as `login_success` or
    /// `login_failed`. Pass the connection address as `ip_address` on the
    /// server; `None` asks the lookup service. `user_agent` is the client's
    /// agent as recorded on the log.
    pub async fn validate_login(
        &self,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        email: &str,
        success: bool,
    ) -> Result<(), VigilError> {
        let ip_address = self.resolve_ip(ip_address).await;

        if self.ip_blocks.is_ip_blocked(&ip_address).await? {
            return Err(GuardError::IpBlocked.into());
        }

        let allowed = self
            .login_attempts
            .track(&ip_address, email, success)
            .await?;
        if !allowed {
            return Err(GuardError::TooManyAttempts.into());
        }

        let action = if success {
            SecurityAction::LoginSuccess
        } else {
            SecurityAction::LoginFailed
        };
        let recent_attempts = self.login_attempts.failed_attempts(&ip_address, email);
        self.track_user_action(
            action,
            TrackedAction::new()
                .with_ip(ip_address)
                .maybe_user_agent(user_agent.map(str::to_string))
                .with_email(email)
                .with_context(ActivityContext {
                    recent_attempts: u32::try_from(recent_attempts).unwrap_or(u32::MAX),
                    request_count: None,
                }),
        )
        .await;

        Ok(())
    }

    /// Log a user action, flagging it when it looks suspicious.
    pub async fn track_user_action(
        &self,
        action: impl Into<SecurityAction>,
        details: TrackedAction,
    ) -> DeliveryOutcome {
        let action = action.into();
        let ip_address = self.resolve_ip(details.ip_address.as_deref()).await;
        let suspicious = self.detector.is_suspicious(action.as_str(), &details.context);

        let mut partial = NewSecurityLog::builder()
            .action(action)
            .ip_address(ip_address)
            .maybe_user_agent(details.user_agent)
            .maybe_email(details.email)
            .suspicious(suspicious);
        if let Some(user_id) = details.user_id {
            partial = partial.user_id(user_id);
        }

        self.logger.log_event(partial.build()).await
    }

    /// Whether an action is suspicious under the configured thresholds.
    pub fn detect_suspicious_activity(&self, action: &str, context: &ActivityContext) -> bool {
        self.detector.is_suspicious(action, context)
    }

    /// Admit or refuse one `action` from `ip_address` inside the configured window.
    ///
    /// The limiter key is `"{ip}_{action}"`.
    pub async fn check_rate_limit(
        &self,
        ip_address: Option<&str>,
        action: &str,
        max_requests: u32,
    ) -> bool {
        let ip_address = self.resolve_ip(ip_address).await;
        let identifier = format!("{ip_address}_{action}");

        let allowed =
            self.rate_limiter
                .check(&identifier, max_requests, self.config.rate_limit_window);
        if !allowed {
            self.event_bus
                .publish(Event::RateLimited {
                    identifier,
                    timestamp: self.clock.now(),
                })
                .await;
        }
        allowed
    }

    pub async fn is_ip_blocked(&self, ip_address: &str) -> Result<bool, VigilError> {
        Ok(self.ip_blocks.is_ip_blocked(ip_address).await?)
    }

    /// Block `ip_address` for the configured duration.
    pub async fn block_ip(&self, ip_address: &str) -> Result<BlockedIp, VigilError> {
        Ok(self.ip_blocks.block_ip(ip_address, None).await?)
    }

    /// Lift a block early. Returns `true` if the IP was blocked.
    pub async fn unblock_ip(&self, ip_address: &str) -> Result<bool, VigilError> {
        Ok(self.ip_blocks.unblock_ip(ip_address).await?)
    }

    pub async fn blocked_until(
        &self,
        ip_address: &str,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, VigilError> {
        Ok(self.ip_blocks.blocked_until(ip_address).await?)
    }

    /// Seconds until the block on `ip_address` lifts, if it is blocked.
    pub async fn retry_after_seconds(&self, ip_address: &str) -> Result<Option<i64>, VigilError> {
        let now = self.clock.now();
        Ok(self
            .ip_blocks
            .blocked_until(ip_address)
            .await?
            .map(|until| (until - now).num_seconds().max(0)))
    }

    pub async fn list_blocked(&self) -> Result<Vec<BlockedIp>, VigilError> {
        Ok(self.ip_blocks.list_blocked().await?)
    }

    /// Assemble and ship a security log. Never fails.
    pub async fn log_security_event(&self, partial: NewSecurityLog) -> DeliveryOutcome {
        self.logger.log_event(partial).await
    }

    /// Logs kept locally because the backend could not be reached, oldest first.
    pub async fn local_security_logs(&self, limit: usize) -> Vec<SecurityLog> {
        self.logger.local_logs(limit).await
    }

    /// Store a log shipped by a client, evicting the oldest past the audit capacity.
    pub async fn ingest_log(&self, log: SecurityLog) -> Result<SecurityLog, VigilError> {
        Ok(self.audit.ingest(log).await?)
    }

    pub async fn recent_audit_logs(&self, limit: usize) -> Result<Vec<SecurityLog>, VigilError> {
        Ok(self.audit.recent(limit).await?)
    }

    pub fn device_fingerprint<P: DeviceProbe + ?Sized>(&self, probe: &P) -> String {
        vigil_core::generate_device_fingerprint(probe)
    }

    /// Advisory expiry check on a JWT session token. The signature is not verified.
    pub fn validate_session(&self, token: &str) -> bool {
        vigil_core::validate_session_token(token, self.clock.now())
    }

    /// Sign in through a popup opened on `host`.
    ///
    /// `host` must deliver popup messages to [`message_bus`](Self::message_bus).
    /// A successful sign-in is logged as `oauth_success`.
    pub async fn sign_in_with(
        &self,
        provider: OAuthProvider,
        host: Arc<dyn PopupHost>,
    ) -> Result<OAuthSession, VigilError> {
        let sign_in = OAuthSignIn::new(
            host,
            self.message_bus.clone(),
            self.handshake_config.clone(),
            self.clock.clone(),
        )
        .with_event_bus(self.event_bus.clone());

        let session = sign_in.sign_in(provider).await?;

        self.log_security_event(
            NewSecurityLog::builder()
                .action(SecurityAction::OAuthSuccess)
                .email(session.user.email.clone())
                .build(),
        )
        .await;

        Ok(session)
    }

    /// Start the background housekeeping task.
    ///
    /// Purges expired IP blocks, stale login attempts and ended rate-limit
    /// windows every `period` until `shutdown` changes.
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        period: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let ip_blocks = Arc::clone(&self.ip_blocks);
        let login_attempts = Arc::clone(&self.login_attempts);
        let rate_limiter = Arc::clone(&self.rate_limiter);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        if let Err(e) = ip_blocks.purge_expired().await {
                            tracing::warn!(error = %e, "Failed to purge expired IP blocks");
                        }
                        let attempts = login_attempts.purge_expired();
                        let windows = rate_limiter.purge_expired();
                        if attempts > 0 || windows > 0 {
                            tracing::debug!(attempts, windows, "Purged stale guard state");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down vigil cleanup task");
                        break;
                    }
                }
            }
        })
    }
}
