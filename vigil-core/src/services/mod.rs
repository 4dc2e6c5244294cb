//! Service layer
//!
//! Each service owns one piece of guard state and is constructed with its
//! collaborators (clock, repositories, transport) so tests can substitute
//! any of them.

pub mod audit;
pub mod ip_block;
pub mod login_attempt;
pub mod rate_limit;
pub mod resolver;
pub mod security_log;

pub use audit::AuditLogService;
pub use ip_block::IpBlockService;
pub use login_attempt::LoginAttemptTracker;
pub use rate_limit::{RateLimitRecord, RateLimiter};
pub use resolver::IpLocationResolver;
pub use security_log::SecurityEventLogger;
