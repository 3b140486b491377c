//! TLS certificate inspection.
//!
//! Opens a TCP connection to `host:443`, performs a verified TLS handshake and
//! reads the peer certificate's expiry and issuer. Any failure along the way
//! (DNS, connect, handshake, verification, parsing) yields the uniform
//! `failed / unknown / unknown` outcome.

use crate::error::DomainMonitorError;
use crate::types::{TlsOutcome, UNKNOWN};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use native_tls::TlsConnector;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

const TLS_PORT: u16 = 443;

/// Canonical rendering of certificate expiry dates.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ASN.1 tags
const TAG_INTEGER: u8 = 0x02;
const TAG_OID: u8 = 0x06;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_PRINTABLE_STRING: u8 = 0x13;
const TAG_T61_STRING: u8 = 0x14;
const TAG_IA5_STRING: u8 = 0x16;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_GENERALIZED_TIME: u8 = 0x18;
const TAG_BMP_STRING: u8 = 0x1e;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_VERSION: u8 = 0xa0;

/// OID 2.5.4.3 (commonName)
const OID_COMMON_NAME: [u8; 3] = [0x55, 0x04, 0x03];

/// Anything that can report on a host's TLS certificate.
///
/// Implementations must not fail: every error is folded into
/// [`TlsOutcome::failed`].
#[async_trait]
pub trait TlsInspector: Send + Sync {
    /// Inspect the certificate served by an already-normalized hostname.
    async fn inspect(&self, host: &str) -> TlsOutcome;
}

/// Fields extracted from a peer certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetails {
    pub not_after: DateTime<Utc>,
    pub issuer_common_name: Option<String>,
}

impl CertificateDetails {
    fn into_outcome(self) -> TlsOutcome {
        TlsOutcome::valid(
            self.not_after.format(EXPIRY_FORMAT).to_string(),
            self.issuer_common_name
                .unwrap_or_else(|| UNKNOWN.to_string()),
        )
    }
}

/// TLS inspector backed by `native-tls` with certificate verification on.
#[derive(Debug, Clone)]
pub struct CertificateInspector {
    timeout: Duration,
}

impl CertificateInspector {
    /// Create an inspector whose connect and handshake each give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connect, handshake and parse the peer certificate.
    async fn fetch_certificate(&self, host: &str) -> Result<CertificateDetails, DomainMonitorError> {
        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| DomainMonitorError::tls(host, e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let addr = format!("{}:{}", host, TLS_PORT);
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| DomainMonitorError::timeout(format!("connect to {}", addr), self.timeout))?
            .map_err(|e| DomainMonitorError::network_with_source("Connection failed", e.to_string()))?;

        let tls_stream = tokio::time::timeout(self.timeout, connector.connect(host, stream))
            .await
            .map_err(|_| {
                DomainMonitorError::timeout(format!("TLS handshake with {}", host), self.timeout)
            })?
            .map_err(|e| DomainMonitorError::tls(host, e.to_string()))?;

        let cert = tls_stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| DomainMonitorError::tls(host, e.to_string()))?
            .ok_or_else(|| DomainMonitorError::tls(host, "No peer certificate presented"))?;

        let der = cert
            .to_der()
            .map_err(|e| DomainMonitorError::tls(host, e.to_string()))?;

        parse_certificate_der(&der)
    }
}

#[async_trait]
impl TlsInspector for CertificateInspector {
    #[instrument(skip(self), fields(host = %host))]
    async fn inspect(&self, host: &str) -> TlsOutcome {
        match self.fetch_certificate(host).await {
            Ok(details) => details.into_outcome(),
            Err(e) => {
                debug!(error = %e, "TLS inspection failed");
                TlsOutcome::failed()
            }
        }
    }
}

/// Extract expiry and issuer CN from a DER-encoded X.509 certificate.
///
/// Walks `Certificate -> TBSCertificate` far enough to read the issuer `Name`
/// and the `Validity` sequence; nothing after `notAfter` is examined.
pub fn parse_certificate_der(der: &[u8]) -> Result<CertificateDetails, DomainMonitorError> {
    let malformed = |what: &str| DomainMonitorError::parse(format!("Malformed certificate: {}", what));

    let (tag, certificate, _) = read_tlv(der).ok_or_else(|| malformed("outer sequence"))?;
    if tag != TAG_SEQUENCE {
        return Err(malformed("outer sequence"));
    }

    let (tag, tbs, _) = read_tlv(certificate).ok_or_else(|| malformed("tbsCertificate"))?;
    if tag != TAG_SEQUENCE {
        return Err(malformed("tbsCertificate"));
    }

    // version is optional and explicitly tagged
    let (mut tag, _, mut rest) = read_tlv(tbs).ok_or_else(|| malformed("version"))?;
    if tag == TAG_VERSION {
        (tag, _, rest) = read_tlv(rest).ok_or_else(|| malformed("serial number"))?;
    }
    if tag != TAG_INTEGER {
        return Err(malformed("serial number"));
    }

    // signature AlgorithmIdentifier
    let (tag, _, next) = read_tlv(rest).ok_or_else(|| malformed("signature algorithm"))?;
    if tag != TAG_SEQUENCE {
        return Err(malformed("signature algorithm"));
    }
    rest = next;

    let (tag, issuer, next) = read_tlv(rest).ok_or_else(|| malformed("issuer"))?;
    if tag != TAG_SEQUENCE {
        return Err(malformed("issuer"));
    }
    rest = next;

    let (tag, validity, _) = read_tlv(rest).ok_or_else(|| malformed("validity"))?;
    if tag != TAG_SEQUENCE {
        return Err(malformed("validity"));
    }

    let (_, _, after_not_before) = read_tlv(validity).ok_or_else(|| malformed("notBefore"))?;
    let (tag, not_after, _) = read_tlv(after_not_before).ok_or_else(|| malformed("notAfter"))?;
    let not_after = parse_time(tag, not_after).ok_or_else(|| malformed("notAfter"))?;

    Ok(CertificateDetails {
        not_after,
        issuer_common_name: find_common_name(issuer),
    })
}

/// Read one DER TLV. Returns `(tag, content, remainder)`.
fn read_tlv(data: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let tag = *data.first()?;
    let first_len = *data.get(1)? as usize;

    let (len, header) = if first_len < 0x80 {
        (first_len, 2)
    } else {
        let num_bytes = first_len & 0x7f;
        if num_bytes == 0 || num_bytes > 4 {
            return None;
        }
        let mut len = 0usize;
        for i in 0..num_bytes {
            len = (len << 8) | *data.get(2 + i)? as usize;
        }
        (len, 2 + num_bytes)
    };

    let end = header.checked_add(len)?;
    if end > data.len() {
        return None;
    }
    Some((tag, &data[header..end], &data[end..]))
}

/// Find the commonName attribute in an X.509 `Name`.
///
/// When several CN attributes are present the last one wins.
fn find_common_name(name: &[u8]) -> Option<String> {
    let mut found = None;
    let mut rdns = name;

    while let Some((tag, rdn, next)) = read_tlv(rdns) {
        rdns = next;
        if tag != TAG_SET {
            continue;
        }

        let mut attributes = rdn;
        while let Some((tag, attribute, next)) = read_tlv(attributes) {
            attributes = next;
            if tag != TAG_SEQUENCE {
                continue;
            }
            let Some((TAG_OID, oid, value)) = read_tlv(attribute) else {
                continue;
            };
            if oid != OID_COMMON_NAME {
                continue;
            }
            if let Some((value_tag, value, _)) = read_tlv(value) {
                if let Some(text) = decode_directory_string(value_tag, value) {
                    found = Some(text);
                }
            }
        }
    }

    found.filter(|cn| !cn.is_empty())
}

fn decode_directory_string(tag: u8, value: &[u8]) -> Option<String> {
    match tag {
        TAG_UTF8_STRING | TAG_PRINTABLE_STRING | TAG_IA5_STRING | TAG_T61_STRING => {
            std::str::from_utf8(value).ok().map(str::to_string)
        }
        TAG_BMP_STRING => {
            if value.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> = value
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => None,
    }
}

fn parse_time(tag: u8, value: &[u8]) -> Option<DateTime<Utc>> {
    let s = std::str::from_utf8(value).ok()?;
    match tag {
        TAG_UTC_TIME => parse_utc_time(s),
        TAG_GENERALIZED_TIME => parse_generalized_time(s),
        _ => None,
    }
}

/// Parse UTCTime (`YYMMDDHHMMSSZ`). Years 50-99 are 19xx, 00-49 are 20xx.
fn parse_utc_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.strip_suffix('Z')?;
    if s.len() != 12 {
        return None;
    }
    let year: i32 = s.get(0..2)?.parse().ok()?;
    let year = if year >= 50 { 1900 + year } else { 2000 + year };
    build_datetime(year, s.get(2..12)?)
}

/// Parse GeneralizedTime (`YYYYMMDDHHMMSSZ`).
fn parse_generalized_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.strip_suffix('Z')?;
    if s.len() != 14 {
        return None;
    }
    let year: i32 = s.get(0..4)?.parse().ok()?;
    build_datetime(year, s.get(4..14)?)
}

/// `rest` is `MMDDHHMMSS`.
fn build_datetime(year: i32, rest: &str) -> Option<DateTime<Utc>> {
    let month: u32 = rest.get(0..2)?.parse().ok()?;
    let day: u32 = rest.get(2..4)?.parse().ok()?;
    let hour: u32 = rest.get(4..6)?.parse().ok()?;
    let min: u32 = rest.get(6..8)?.parse().ok()?;
    let sec: u32 = rest.get(8..10)?.parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, min, sec)
        .map(|dt| dt.and_utc())
}
