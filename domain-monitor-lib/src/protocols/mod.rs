//! Network probes used by the check engine.
//!
//! Each probe sits behind a trait so the engine can be driven by test
//! doubles, and each implementation folds its own failures into an outcome
//! value instead of returning errors.

/// HTTP reachability probe
pub mod http;

/// TLS certificate inspection
pub mod tls;

pub use http::{HttpProber, ReachabilityProber};
pub use tls::{parse_certificate_der, CertificateDetails, CertificateInspector, TlsInspector};
