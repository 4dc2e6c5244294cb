//! Best-effort client IP and location lookup.
//!
//! The values produced here are advisory metadata for security logs. A client
//! reporting its own IP has no trust value; server-side callers should pass the
//! connection address instead of asking the resolver.

use std::sync::Arc;

use rand::seq::IndexedRandom;

use crate::{
    config::{LookupFallback, SecurityConfig},
    storage::Location,
    transport::SecurityTransport,
};

/// Placeholder addresses used when the lookup service is unreachable.
pub const MOCK_IPS: [&str; 3] = ["192.168.1.100", "10.0.0.50", "172.16.0.25"];

/// Reported when the lookup fails under [`LookupFallback::Unknown`].
pub const UNKNOWN_IP: &str = "unknown";

fn mock_locations() -> [Location; 5] {
    [
        Location::new("United States", "New York", "NY"),
        Location::new("United Kingdom", "London", "England"),
        Location::new("Canada", "Toronto", "ON"),
        Location::new("Australia", "Sydney", "NSW"),
        Location::new("Nigeria", "Lagos", "Lagos State"),
    ]
}

pub struct IpLocationResolver<T: SecurityTransport> {
    transport: Arc<T>,
    lookup_url: String,
    fallback: LookupFallback,
}

impl<T: SecurityTransport> IpLocationResolver<T> {
    pub fn new(transport: Arc<T>, config: &SecurityConfig) -> Self {
        Self {
            transport,
            lookup_url: config.ip_lookup_url.clone(),
            fallback: config.lookup_fallback,
        }
    }

    pub fn fallback(&self) -> LookupFallback {
        self.fallback
    }

    /// Ask the lookup service for the public IP, falling back on any failure.
    pub async fn client_ip(&self) -> String {
        match self.transport.fetch_client_ip(&self.lookup_url).await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::warn!(error = %e, fallback = ?self.fallback, "Client IP lookup failed");
                self.fallback_ip()
            }
        }
    }

    /// Location metadata for an IP.
    ///
    /// No geo-IP source is wired in, so this is always the configured fallback:
    /// a random placeholder under [`LookupFallback::Mock`], `None` otherwise.
    pub fn location_for(&self, _ip: &str) -> Option<Location> {
        match self.fallback {
            LookupFallback::Mock => mock_locations().choose(&mut rand::rng()).cloned(),
            LookupFallback::Unknown => None,
        }
    }

    fn fallback_ip(&self) -> String {
        match self.fallback {
            LookupFallback::Mock => MOCK_IPS
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or(UNKNOWN_IP)
                .to_string(),
            LookupFallback::Unknown => UNKNOWN_IP.to_string(),
        }
    }
}
