//! Fixed-window request limiter.
//!
//! Each identifier owns a counter and a reset instant. The first call after
//! the reset instant starts a fresh window; calls inside a window are admitted
//! until the counter reaches the budget. Windows do not slide, so a burst that
//! straddles a boundary can admit up to twice the budget in a short span.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{clock::Clock, config::SecurityConfig};

/// Counter state for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

pub struct RateLimiter {
    records: DashMap<String, RateLimitRecord>,
    clock: Arc<dyn Clock>,
    default_max_requests: u32,
    default_window: Duration,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, config: &SecurityConfig) -> Self {
        Self {
            records: DashMap::new(),
            clock,
            default_max_requests: config.rate_limit_max_requests,
            default_window: config.rate_limit_window,
        }
    }

    /// Admit or refuse one request for `identifier`.
    ///
    /// Refused calls do not increment the counter.
    pub fn check(&self, identifier: &str, max_requests: u32, window: Duration) -> bool {
        let now = self.clock.now();

        match self.records.entry(identifier.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitRecord {
                    count: 1,
                    reset_time: now + window,
                });
                true
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if now > record.reset_time {
                    *record = RateLimitRecord {
                        count: 1,
                        reset_time: now + window,
                    };
                    true
                } else if record.count >= max_requests {
                    tracing::debug!(identifier, count = record.count, "Rate limit exceeded");
                    false
                } else {
                    record.count += 1;
                    true
                }
            }
        }
    }

    /// [`check`](Self::check) with the configured budget and window.
    pub fn check_default(&self, identifier: &str) -> bool {
        self.check(identifier, self.default_max_requests, self.default_window)
    }

    /// Current counter state, if the identifier has been seen.
    pub fn record(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.records.get(identifier).map(|r| *r.value())
    }

    /// Drop every record whose window has ended. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records.retain(|_, record| now <= record.reset_time);
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
