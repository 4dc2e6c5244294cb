//! Outbound HTTP used by the logger and the IP resolver.
//!
//! Both callers treat every [`TransportError`] as a signal to fall back, so the
//! trait stays small and implementations never need to retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{error::TransportError, storage::SecurityLog};

#[async_trait]
pub trait SecurityTransport: Send + Sync + 'static {
    /// Ask an external lookup service for the caller's public IP.
    ///
    /// The service is expected to answer with `{"ip": "..."}`.
    async fn fetch_client_ip(&self, url: &str) -> Result<String, TransportError>;

    /// Ship one security log to the backend. Any non-2xx answer is an error.
    async fn post_security_log(&self, url: &str, log: &SecurityLog) -> Result<(), TransportError>;
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    ip: String,
}

/// [`SecurityTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecurityTransport for ReqwestTransport {
    async fn fetch_client_ip(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        Ok(body.ip)
    }

    async fn post_security_log(&self, url: &str, log: &SecurityLog) -> Result<(), TransportError> {
        let response = self
            .client
            .post(url)
            .json(log)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(())
    }
}

/// A transport with no network. Every call fails with [`TransportError::Offline`],
/// which sends the logger and the resolver straight to their fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl SecurityTransport for OfflineTransport {
    async fn fetch_client_ip(&self, _url: &str) -> Result<String, TransportError> {
        Err(TransportError::Offline)
    }

    async fn post_security_log(
        &self,
        _url: &str,
        _log: &SecurityLog,
    ) -> Result<(), TransportError> {
        Err(TransportError::Offline)
    }
}

/// Lets a shared, type-erased transport stand in wherever a concrete one is expected.
#[async_trait]
impl<T: SecurityTransport + ?Sized> SecurityTransport for std::sync::Arc<T> {
    async fn fetch_client_ip(&self, url: &str) -> Result<String, TransportError> {
        (**self).fetch_client_ip(url).await
    }

    async fn post_security_log(&self, url: &str, log: &SecurityLog) -> Result<(), TransportError> {
        (**self).post_security_log(url, log).await
    }
}
