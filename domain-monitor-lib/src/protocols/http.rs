//! HTTP reachability probing.
//!
//! A host is reachable when a plain `GET http://<host>` answers with status
//! 200. Redirects are followed per the client's default policy.

use crate::error::DomainMonitorError;
use crate::types::ReachabilityOutcome;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Anything that can tell whether a host answers HTTP.
///
/// Implementations must not fail: every error is folded into a `FAILED`
/// outcome.
#[async_trait]
pub trait ReachabilityProber: Send + Sync {
    /// Probe an already-normalized hostname.
    async fn probe(&self, host: &str) -> ReachabilityOutcome;
}

/// Reachability prober backed by `reqwest`.
#[derive(Clone)]
pub struct HttpProber {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    /// Create a prober whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DomainMonitorError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("domain-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DomainMonitorError::network_with_source(
                    "Failed to create HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Issue the GET and return the final status code.
    async fn fetch_status(&self, host: &str) -> Result<u16, DomainMonitorError> {
        let url = format!("http://{}", host);
        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DomainMonitorError::timeout(format!("GET {}", url), self.timeout)
            } else {
                DomainMonitorError::from(e)
            }
        })?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl ReachabilityProber for HttpProber {
    async fn probe(&self, host: &str) -> ReachabilityOutcome {
        match self.fetch_status(host).await {
            Ok(200) => ReachabilityOutcome::ok(),
            Ok(status) => {
                debug!(host = %host, status, "HTTP probe returned non-200 status");
                ReachabilityOutcome::failed()
            }
            Err(e) => {
                debug!(host = %host, error = %e, "HTTP probe failed");
                ReachabilityOutcome::failed()
            }
        }
    }
}
