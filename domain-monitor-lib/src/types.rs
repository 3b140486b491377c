//! Core data types for domain health checking.
//!
//! This module defines the records produced by the check engine, the inputs it
//! accepts, and the configuration that bounds its concurrency and timeouts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Placeholder used on the wire when a certificate field could not be determined.
pub const UNKNOWN: &str = "unknown";

/// A domain as handed to the checker.
///
/// Callers send either bare strings (`"example.com"`) or objects carrying a
/// `url` field (`{"url": "https://example.com"}`, typically a previously
/// stored [`DomainResult`]). Both shapes are resolved once at batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainInput {
    /// A bare host or URL string
    RawHost(String),

    /// A structured entry carrying the value to check in `url`
    TaggedHost { url: String },
}

impl DomainInput {
    /// The value to check, exactly as the caller supplied it.
    pub fn url(&self) -> &str {
        match self {
            DomainInput::RawHost(url) => url,
            DomainInput::TaggedHost { url } => url,
        }
    }

}

impl From<&str> for DomainInput {
    fn from(value: &str) -> Self {
        DomainInput::RawHost(value.to_string())
    }
}

impl From<String> for DomainInput {
    fn from(value: String) -> Self {
        DomainInput::RawHost(value)
    }
}

/// A batch of domains to check on behalf of one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub domains: Vec<DomainInput>,
    pub owner: String,
}

impl CheckRequest {
    pub fn new<O: Into<String>>(domains: Vec<DomainInput>, owner: O) -> Self {
        Self {
            domains,
            owner: owner.into(),
        }
    }
}

/// HTTP reachability verdict. Serialized as `"OK"` / `"FAILED"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAILED")]
    Failed,
}

/// TLS certificate verdict. Serialized as `"valid"` / `"failed"` / `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslStatus {
    Valid,
    Failed,
    Unknown,
}

/// Health record for one checked domain.
///
/// Field names and enum literals are consumed by frontends as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainResult {
    /// The value the caller asked to check (before host normalization)
    pub url: String,

    /// `OK` when `http://<host>` answered 200
    pub status_code: StatusCode,

    /// Certificate verdict; `unknown` whenever the HTTP probe failed
    pub ssl_status: SslStatus,

    /// Certificate "not after" as `YYYY-MM-DD HH:MM:SS` (UTC), or `unknown`
    pub expiration_date: String,

    /// Certificate issuer common name, or `unknown`
    pub issuer: String,
}

impl DomainResult {
    /// The pre-initialized record every check starts from: `FAILED` with an
    /// unknown certificate.
    pub fn failed<U: Into<String>>(url: U) -> Self {
        Self {
            url: url.into(),
            status_code: StatusCode::Failed,
            ssl_status: SslStatus::Unknown,
            expiration_date: UNKNOWN.to_string(),
            issuer: UNKNOWN.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == StatusCode::Ok
    }
}

/// Outcome of one reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachabilityOutcome {
    pub status: StatusCode,
}

impl ReachabilityOutcome {
    pub fn ok() -> Self {
        Self {
            status: StatusCode::Ok,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: StatusCode::Failed,
        }
    }
}

/// Outcome of one TLS certificate inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOutcome {
    /// `Valid` or `Failed`; an inspection never reports `Unknown` itself
    pub status: SslStatus,
    pub expiry: String,
    pub issuer: String,
}

impl TlsOutcome {
    pub fn valid<E: Into<String>, I: Into<String>>(expiry: E, issuer: I) -> Self {
        Self {
            status: SslStatus::Valid,
            expiry: expiry.into(),
            issuer: issuer.into(),
        }
    }

    /// The uniform record for any inspection failure.
    pub fn failed() -> Self {
        Self {
            status: SslStatus::Failed,
            expiry: UNKNOWN.to_string(),
            issuer: UNKNOWN.to_string(),
        }
    }
}

/// Everything one invocation of the checker produced.
///
/// Created fresh per batch and never shared between batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// The user on whose behalf the batch ran
    pub owner: String,

    /// Collected records, in completion order (not input order)
    pub results: Vec<DomainResult>,

    /// Number of domains submitted, duplicates included
    pub expected_count: usize,

    /// Number of records collected before the batch deadline
    pub actual_count: usize,

    /// Workers still running when the batch deadline passed
    pub incomplete_workers: usize,

    /// Wall-clock time spent on the batch
    #[serde(skip)]
    pub duration: Duration,
}

impl BatchOutcome {
    pub fn empty<O: Into<String>>(owner: O) -> Self {
        Self {
            owner: owner.into(),
            results: Vec::new(),
            expected_count: 0,
            actual_count: 0,
            incomplete_workers: 0,
            duration: Duration::ZERO,
        }
    }

    /// Checks that were submitted but never collected.
    pub fn lost_count(&self) -> usize {
        self.expected_count.saturating_sub(self.actual_count)
    }

    pub fn is_complete(&self) -> bool {
        self.lost_count() == 0
    }

    pub fn ok_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }
}

/// Configuration options for the check engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    /// Upper bound on concurrent workers per batch
    /// Default: 10, Minimum: 1
    pub max_workers: usize,

    /// Timeout for the HTTP reachability probe
    /// Default: 5 seconds
    pub http_timeout: Duration,

    /// Timeout for TCP connect and TLS handshake during inspection
    /// Default: 5 seconds
    pub ssl_timeout: Duration,

    /// Wall-clock budget for a whole batch
    /// Default: 30 seconds
    pub overall_timeout: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            http_timeout: Duration::from_secs(5),
            ssl_timeout: Duration::from_secs(5),
            overall_timeout: Duration::from_secs(30),
        }
    }
}

impl CheckConfig {
    /// Set the worker cap. Zero is raised to 1.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_ssl_timeout(mut self, timeout: Duration) -> Self {
        self.ssl_timeout = timeout;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    /// Number of workers for a batch of `domain_count` domains:
    /// `min(max_workers, 2 * domain_count)`, never below 1.
    pub fn worker_count(&self, domain_count: usize) -> usize {
        let cap = self.max_workers.max(1);
        cap.min(domain_count.saturating_mul(2)).max(1)
    }

    /// Deadline for one combined check: the larger of the two sub-check timeouts.
    pub fn combined_timeout(&self) -> Duration {
        self.http_timeout.max(self.ssl_timeout)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_workers == 0 {
            return Err(crate::DomainMonitorError::config(
                "max_workers must be at least 1",
            ));
        }
        for (name, timeout) in [
            ("http_timeout", self.http_timeout),
            ("ssl_timeout", self.ssl_timeout),
            ("overall_timeout", self.overall_timeout),
        ] {
            if timeout.is_zero() {
                return Err(crate::DomainMonitorError::config(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "OK"),
            StatusCode::Failed => write!(f, "FAILED"),
        }
    }
}

impl fmt::Display for SslStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslStatus::Valid => write!(f, "valid"),
            SslStatus::Failed => write!(f, "failed"),
            SslStatus::Unknown => write!(f, "unknown"),
        }
    }
}
