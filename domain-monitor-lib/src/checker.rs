//! Main domain checker implementation.
//!
//! This module provides the `DomainChecker` that runs batches of combined
//! checks (HTTP reachability + TLS certificate inspection) over a bounded
//! worker pool and reconciles what came back against what was asked for.

use crate::concurrent::WorkerPool;
use crate::error::DomainMonitorError;
use crate::protocols::{CertificateInspector, HttpProber, ReachabilityProber, TlsInspector};
use crate::store::PersistenceSink;
use crate::types::{
    BatchOutcome, CheckConfig, CheckRequest, DomainInput, DomainResult, ReachabilityOutcome,
    StatusCode, TlsOutcome,
};
use crate::utils::{normalize_host, validate_host};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Main domain checker that coordinates health checks.
///
/// The `DomainChecker` handles:
/// - Input normalization (`"https://www.example.com/path"` -> `example.com`)
/// - Worker pool sizing and the overall batch deadline
/// - Running the HTTP probe and TLS inspection concurrently per domain
/// - Result accounting and hand-off to the persistence sink
///
/// # Example
///
/// ```rust,no_run
/// use domain_monitor_lib::{DomainChecker, DomainInput};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = DomainChecker::new()?;
///     let domains = vec![DomainInput::from("example.com")];
///     let outcome = checker.check(&domains, "alice").await;
///     for result in &outcome.results {
///         println!("{}: {} ({})", result.url, result.status_code, result.ssl_status);
///     }
///     Ok(())
/// }
/// ```
pub struct DomainChecker {
    /// Configuration settings for this checker instance
    config: CheckConfig,
    /// The per-domain check, shared with pool workers
    combined: CombinedCheck,
    /// Where finished batches are stored, if anywhere
    sink: Option<Arc<dyn PersistenceSink>>,
}

/// Everything a worker needs to check one domain.
#[derive(Clone)]
struct CombinedCheck {
    prober: Arc<dyn ReachabilityProber>,
    inspector: Arc<dyn TlsInspector>,
    http_timeout: Duration,
    ssl_timeout: Duration,
    combined_timeout: Duration,
}

impl DomainChecker {
    /// Create a new domain checker with default configuration.
    ///
    /// Default settings:
    /// - Max workers: 10
    /// - HTTP timeout: 5 seconds
    /// - SSL timeout: 5 seconds
    /// - Overall batch timeout: 30 seconds
    pub fn new() -> Result<Self, DomainMonitorError> {
        Self::with_config(CheckConfig::default())
    }

    /// Create a new domain checker with custom configuration, using the
    /// network-backed prober and inspector.
    ///
    /// # Example
    ///
    /// ```rust
    /// use domain_monitor_lib::{CheckConfig, DomainChecker};
    /// use std::time::Duration;
    ///
    /// let config = CheckConfig::default()
    ///     .with_max_workers(20)
    ///     .with_http_timeout(Duration::from_secs(3))
    ///     .with_overall_timeout(Duration::from_secs(60));
    ///
    /// let checker = DomainChecker::with_config(config).unwrap();
    /// assert_eq!(checker.config().max_workers, 20);
    /// ```
    pub fn with_config(config: CheckConfig) -> Result<Self, DomainMonitorError> {
        config.validate()?;
        let prober = HttpProber::new(config.http_timeout)?;
        let inspector = CertificateInspector::new(config.ssl_timeout);
        Ok(Self::with_components(
            config,
            Arc::new(prober),
            Arc::new(inspector),
        ))
    }

    /// Create a checker from explicit components.
    ///
    /// Useful for alternative transports and for tests that substitute the
    /// network with doubles.
    pub fn with_components(
        config: CheckConfig,
        prober: Arc<dyn ReachabilityProber>,
        inspector: Arc<dyn TlsInspector>,
    ) -> Self {
        let combined = CombinedCheck {
            prober,
            inspector,
            http_timeout: config.http_timeout,
            ssl_timeout: config.ssl_timeout,
            combined_timeout: config.combined_timeout(),
        };
        Self {
            config,
            combined,
            sink: None,
        }
    }

    /// Store every finished batch in `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Get the current configuration for this checker.
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Check a batch of domains on behalf of `owner`.
    ///
    /// Every domain is checked independently (duplicates included) by up to
    /// `min(max_workers, 2 * domains.len())` workers. The call returns once all
    /// workers are done or the overall timeout passes, whichever comes first;
    /// in the latter case the outcome holds fewer results than domains and the
    /// shortfall is logged. Results arrive in completion order, so correlate
    /// them by `url`.
    ///
    /// This never fails: per-domain problems become `FAILED` / `unknown`
    /// records, and a failing persistence sink is logged.
    pub async fn check(&self, domains: &[DomainInput], owner: &str) -> BatchOutcome {
        let start = Instant::now();
        let urls: Vec<String> = domains.iter().map(|d| d.url().to_string()).collect();
        let expected_count = urls.len();

        if expected_count == 0 {
            debug!(owner = %owner, "Empty batch, nothing to check");
            return BatchOutcome::empty(owner);
        }

        let worker_count = self.config.worker_count(expected_count);
        info!(
            owner = %owner,
            domains = expected_count,
            workers = worker_count,
            "Queued {} domains for {}",
            expected_count,
            owner
        );

        let pool = WorkerPool::new(worker_count, self.config.overall_timeout);
        let combined = self.combined.clone();
        let report = pool
            .run(urls, move |url| {
                let combined = combined.clone();
                async move { combined.run_guarded(url).await }
            })
            .await;

        let actual_count = report.results.len();
        info!(
            owner = %owner,
            expected = expected_count,
            actual = actual_count,
            "Expected {} results, got {} for {}",
            expected_count,
            actual_count,
            owner
        );
        if actual_count < expected_count {
            warn!(
                owner = %owner,
                lost = expected_count - actual_count,
                "Lost {} checks for {}",
                expected_count - actual_count,
                owner
            );
        }

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.upsert_domains(&report.results, owner).await {
                error!(owner = %owner, error = %e, "Failed to store domain results");
            }
        }

        BatchOutcome {
            owner: owner.to_string(),
            results: report.results,
            expected_count,
            actual_count,
            incomplete_workers: report.incomplete_workers,
            duration: start.elapsed(),
        }
    }

    /// Check the domains of `request` on behalf of its owner.
    pub async fn check_request(&self, request: &CheckRequest) -> BatchOutcome {
        self.check(&request.domains, &request.owner).await
    }

    /// Run the combined check for a single domain, outside any batch.
    ///
    /// Nothing is persisted.
    pub async fn check_domain(&self, domain: &DomainInput) -> DomainResult {
        self.combined.run_guarded(domain.url().to_string()).await
    }
}

impl CombinedCheck {
    /// Run the combined check, converting a panic into a failure record.
    async fn run_guarded(&self, url: String) -> DomainResult {
        match AssertUnwindSafe(self.run(&url)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(url = %url, "Domain check panicked");
                DomainResult::failed(url)
            }
        }
    }

    /// Probe and inspect one domain concurrently and merge the two outcomes.
    #[instrument(skip(self), fields(url = %url))]
    async fn run(&self, url: &str) -> DomainResult {
        let host = normalize_host(url);
        if let Err(e) = validate_host(&host) {
            warn!(error = %e, "Skipping malformed domain");
            return DomainResult::failed(url);
        }

        // Sub-check deadlines are armed before the outer one, so they win ties
        let probe = tokio::time::timeout(self.http_timeout, self.prober.probe(&host));
        let inspect = tokio::time::timeout(self.ssl_timeout, self.inspector.inspect(&host));
        let joined = tokio::time::timeout(self.combined_timeout, async {
            tokio::join!(probe, inspect)
        })
        .await;

        let (reachability, tls) = match joined {
            Ok(pair) => pair,
            Err(_) => {
                warn!(host = %host, "Combined check exceeded {:?}", self.combined_timeout);
                return DomainResult::failed(url);
            }
        };

        let reachability = reachability.unwrap_or_else(|_| {
            debug!(host = %host, "HTTP probe timed out");
            ReachabilityOutcome::failed()
        });
        let tls = tls.unwrap_or_else(|_| {
            debug!(host = %host, "TLS inspection timed out");
            TlsOutcome::failed()
        });

        let result = merge_outcomes(url, reachability, tls);
        debug!(
            host = %host,
            status = %result.status_code,
            ssl = %result.ssl_status,
            "Domain checked"
        );
        result
    }
}

/// Combine the two sub-check outcomes into one record.
///
/// The HTTP verdict gates everything: when the probe did not return 200 the
/// record keeps its `unknown` certificate fields even if the inspection
/// succeeded.
pub fn merge_outcomes(url: &str, reachability: ReachabilityOutcome, tls: TlsOutcome) -> DomainResult {
    let mut result = DomainResult::failed(url);

    if reachability.status == StatusCode::Ok {
        result.status_code = StatusCode::Ok;
        result.ssl_status = tls.status;
        result.expiration_date = tls.expiry;
        result.issuer = tls.issuer;
    }

    result
}
