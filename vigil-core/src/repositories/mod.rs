//! Repository traits for data access layer
//!
//! This module defines the repository interfaces that services use to interact with storage.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus lifecycle methods
//!
//! [`memory::InMemoryRepositoryProvider`] is the default backend. Persistent
//! backends live in their own crates.

pub mod adapter;
pub mod block_list;
pub mod memory;
pub mod security_log;

pub use adapter::{
    AuditLogRepositoryAdapter, BlockListRepositoryAdapter, LocalLogRepositoryAdapter,
};
pub use block_list::BlockListRepository;
pub use memory::InMemoryRepositoryProvider;
pub use security_log::SecurityLogRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for block list access.
pub trait BlockListRepositoryProvider: Send + Sync + 'static {
    /// The block list repository implementation type
    type BlockListRepo: BlockListRepository;

    /// Get the block list repository
    fn block_list(&self) -> &Self::BlockListRepo;
}

/// Provider trait for the two security-log lists.
pub trait SecurityLogRepositoryProvider: Send + Sync + 'static {
    /// The security log repository implementation type
    type SecurityLogRepo: SecurityLogRepository;

    /// Logs kept locally because the backend could not be reached
    fn local_logs(&self) -> &Self::SecurityLogRepo;

    /// Logs received through the ingest endpoint
    fn audit_logs(&self) -> &Self::SecurityLogRepo;
}

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// # Example
///
/// ```rust,ignore
/// use vigil_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl BlockListRepositoryProvider for MyStorage {
///     type BlockListRepo = MyBlockList;
///     fn block_list(&self) -> &Self::BlockListRepo { &self.block_list }
/// }
///
/// // ... implement SecurityLogRepositoryProvider ...
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: BlockListRepositoryProvider + SecurityLogRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
