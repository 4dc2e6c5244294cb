//! Builder pattern for constructing Vigil instances
//!
//! This module provides a type-safe builder for creating [`Vigil`] instances with
//! compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil::VigilBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let vigil = VigilBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or keep everything in memory
//!     let vigil = VigilBuilder::new().with_in_memory().build().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use vigil_core::{
    Clock, EventBus, ReqwestTransport, SecurityConfig, SystemClock,
    oauth::HandshakeConfig,
    repositories::{InMemoryRepositoryProvider, RepositoryProvider},
};

use crate::{SharedTransport, Vigil};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Vigil instance.
#[derive(Debug, thiserror::Error)]
pub enum VigilBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`VigilBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Vigil`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
///
/// # Example
///
/// ```rust,no_run
/// use chrono::Duration;
/// use vigil::{SecurityConfig, VigilBuilder};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let vigil = VigilBuilder::new()
///         .with_in_memory()
///         .with_config(SecurityConfig::default().with_block_duration(Duration::minutes(30)))
///         .build()
///         .await?;
///
///     Ok(())
/// }
/// ```
pub struct VigilBuilder<Storage> {
    storage: Storage,
    config: SecurityConfig,
    transport: Option<SharedTransport>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    handshake_config: HandshakeConfig,
    apply_migrations: bool,
}

impl Default for VigilBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl VigilBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Security config: [`SecurityConfig::default`] (5 attempts per hour, 15 minute blocks)
    /// - Transport: `reqwest`, created during `build()`
    /// - Clock: system time
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: SecurityConfig::default(),
            transport: None,
            clock: Arc::new(SystemClock),
            event_bus: EventBus::new(),
            handshake_config: HandshakeConfig::default(),
            apply_migrations: false,
        }
    }

    fn with_storage<R: RepositoryProvider>(self, repositories: Arc<R>) -> VigilBuilder<WithStorage<R>> {
        VigilBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            transport: self.transport,
            clock: self.clock,
            event_bus: self.event_bus,
            handshake_config: self.handshake_config,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Keep the block list and both log lists in process memory.
    pub fn with_in_memory(self) -> VigilBuilder<WithStorage<InMemoryRepositoryProvider>> {
        self.with_storage(Arc::new(InMemoryRepositoryProvider::new()))
    }

    /// Use a custom repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> VigilBuilder<WithStorage<R>> {
        self.with_storage(repositories)
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "sqlite")]
impl VigilBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://vigil.db?mode=rwc")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<VigilBuilder<WithStorage<crate::SqliteRepositoryProvider>>, VigilBuilderError> {
        let storage = crate::SqliteStorage::connect(url)
            .await
            .map_err(|e| VigilBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_storage(Arc::new(storage.into_provider())))
    }

    /// Configure SQLite storage with an existing connection pool.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use sqlx::SqlitePool;
    /// use vigil::VigilBuilder;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = SqlitePool::connect("sqlite::memory:").await?;
    ///
    /// let vigil = VigilBuilder::new()
    ///     .with_sqlite_pool(pool)
    ///     .apply_migrations(true)
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> VigilBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_storage(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> VigilBuilder<WithStorage<R>> {
    /// Replace the security configuration.
    pub fn with_config(mut self, config: SecurityConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the security configuration from `VIGIL_*` environment variables.
    pub fn with_config_from_env(mut self) -> Result<Self, VigilBuilderError> {
        self.config = SecurityConfig::from_env()
            .map_err(|e| VigilBuilderError::InvalidConfiguration(e.to_string()))?;
        Ok(self)
    }

    /// Ship logs and look up IPs through `transport` instead of `reqwest`.
    ///
    /// Pass [`OfflineTransport`](vigil_core::OfflineTransport) to keep every
    /// log local.
    pub fn with_transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Drive blocks, windows and timestamps from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish guard events on an existing bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_handshake_config(mut self, handshake_config: HandshakeConfig) -> Self {
        self.handshake_config = handshake_config;
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the Vigil instance.
    ///
    /// If `apply_migrations(true)` was called, migrations will be applied
    /// before returning.
    pub async fn build(self) -> Result<Vigil<R>, VigilBuilderError> {
        if self.config.max_login_attempts == 0 {
            return Err(VigilBuilderError::InvalidConfiguration(
                "max_login_attempts must be at least 1".to_string(),
            ));
        }

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| VigilBuilderError::Migration(e.to_string()))?;
        }

        let transport: SharedTransport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new()
                    .map_err(|e| VigilBuilderError::InvalidConfiguration(e.to_string()))?,
            ),
        };

        Ok(Vigil::from_parts(
            self.storage.repositories,
            self.config,
            transport,
            self.clock,
            self.event_bus,
            self.handshake_config,
        ))
    }
}
