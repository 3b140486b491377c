//! # Domain Monitor Library
//!
//! A concurrent health-check engine for lists of domains.
//!
//! Each domain gets an HTTP reachability probe and a TLS certificate
//! inspection, run side by side. A batch of domains is spread over a bounded
//! pool of workers with an overall deadline, and the engine reports how many
//! results it actually collected against how many it was asked for.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_monitor_lib::{CheckConfig, DomainChecker, DomainInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = DomainChecker::with_config(CheckConfig::default().with_max_workers(4))?;
//!     let domains: Vec<DomainInput> = vec!["example.com".into(), "https://www.rust-lang.org".into()];
//!
//!     let outcome = checker.check(&domains, "alice").await;
//!     for result in &outcome.results {
//!         println!("{} {} {} {}", result.url, result.status_code, result.ssl_status, result.issuer);
//!     }
//!     println!("{}/{} collected", outcome.actual_count, outcome.expected_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Combined checks**: `http://<host>` must answer 200; the certificate on
//!   port 443 is verified and its expiry and issuer are reported
//! - **Bounded concurrency**: `min(max_workers, 2 * domains)` workers per batch
//! - **Advisory batch deadline**: late results are dropped, never awaited
//! - **Persistence**: per-owner JSON files, merged by url
//! - **Schedules**: hourly, daily or fixed-interval reruns

pub use checker::{merge_outcomes, DomainChecker};
pub use concurrent::{PoolReport, WorkerPool};
pub use config::{
    load_env_config, parse_timeout_string, ChecksConfig, ConfigManager, EnvConfig, FileConfig,
    ScheduleConfig, StorageConfig,
};
pub use error::DomainMonitorError;
pub use protocols::{
    parse_certificate_der, CertificateDetails, CertificateInspector, HttpProber,
    ReachabilityProber, TlsInspector,
};
pub use schedule::{run_schedule, Schedule};
pub use store::{merge_by_url, JsonFileStore, MemoryStore, PersistenceSink};
pub use types::{
    BatchOutcome, CheckConfig, CheckRequest, DomainInput, DomainResult, ReachabilityOutcome,
    SslStatus, StatusCode, TlsOutcome, UNKNOWN,
};
pub use utils::{normalize_host, parse_domain_list, validate_host};

// Internal modules - reachable through the re-exports above
mod checker;
mod concurrent;
mod config;
mod error;
mod protocols;
mod schedule;
mod store;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DomainMonitorError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
