//! Utility functions for host normalization and domain-list parsing.
//!
//! The reachability probe and the TLS inspection both operate on a bare
//! hostname; everything that turns user input into that hostname lives here.

use crate::error::DomainMonitorError;
use crate::types::DomainInput;

/// Reduce a URL-ish input to the bare hostname that gets probed.
///
/// Strips `https://` and `http://`, then a leading `www.`, and truncates at the
/// first `/`. Surrounding whitespace is ignored.
///
/// ```
/// use domain_monitor_lib::normalize_host;
///
/// assert_eq!(normalize_host("https://www.example.com/path"), "example.com");
/// assert_eq!(normalize_host("example.org"), "example.org");
/// ```
pub fn normalize_host(input: &str) -> String {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);

    without_www
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Validate a normalized hostname before any network call is made.
///
/// This is a basic syntax check; unresolvable names are caught by the probes.
pub fn validate_host(host: &str) -> Result<(), DomainMonitorError> {
    if host.is_empty() {
        return Err(DomainMonitorError::invalid_domain(
            host,
            "Host cannot be empty",
        ));
    }

    if host.len() > 253 {
        return Err(DomainMonitorError::invalid_domain(host, "Host too long"));
    }

    if host.chars().any(|c| c.is_whitespace()) {
        return Err(DomainMonitorError::invalid_domain(
            host,
            "Host cannot contain whitespace",
        ));
    }

    // Allow an optional :port, as the probe URL would
    let name = host.rsplit_once(':').map_or(host, |(name, _)| name);
    if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return Err(DomainMonitorError::invalid_domain(
            host,
            "Host has an empty label",
        ));
    }

    Ok(())
}

/// Parse a list of domains from file content.
///
/// Accepts either a JSON array (of strings and/or `{"url": ...}` objects) or
/// plain text with one domain per line. In plain text, blank lines and lines
/// starting with `#` are skipped and only the first CSV column is used.
pub fn parse_domain_list(content: &str) -> Result<Vec<DomainInput>, DomainMonitorError> {
    let trimmed = content.trim_start();

    if trimmed.starts_with('[') {
        let inputs: Vec<DomainInput> = serde_json::from_str(trimmed)?;
        return Ok(inputs);
    }

    Ok(content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(',').next().unwrap_or(line).trim().to_string())
        .filter(|domain| !domain.is_empty())
        .map(DomainInput::RawHost)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host_strips_scheme_www_and_path() {
        assert_eq!(normalize_host("https://www.good.com/path"), "good.com");
        assert_eq!(normalize_host("http://example.com"), "example.com");
        assert_eq!(normalize_host("www.example.com"), "example.com");
        assert_eq!(normalize_host("example.com/a/b?c=d"), "example.com");
        assert_eq!(normalize_host("  sub.example.com  "), "sub.example.com");
        assert_eq!(normalize_host("bad.invalid"), "bad.invalid");
    }

    #[test]
    fn test_normalize_host_only_strips_leading_www() {
        assert_eq!(normalize_host("mywww.example.com"), "mywww.example.com");
        assert_eq!(normalize_host("shop.www.example.com"), "shop.www.example.com");
    }

    #[test]
    fn test_normalize_host_degenerate_inputs() {
        assert_eq!(normalize_host(""), "");
        assert_eq!(normalize_host("https://"), "");
        assert_eq!(normalize_host("/path/only"), "");
    }

    #[test]
    fn test_validate_host() {
        assert!(validate_host("example.com").is_ok());
        assert!(validate_host("localhost").is_ok());
        assert!(validate_host("127.0.0.1:8080").is_ok());

        assert!(validate_host("").is_err());
        assert!(validate_host("exa mple.com").is_err());
        assert!(validate_host(".example.com").is_err());
        assert!(validate_host("example..com").is_err());
        assert!(validate_host(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_parse_domain_list_plain_text() {
        let content = r#"
# monitored sites
example.com
  https://www.shop.example.org/cart
csv.example.net,owner,notes

"#;
        let domains = parse_domain_list(content).unwrap();
        let urls: Vec<&str> = domains.iter().map(|d| d.url()).collect();
        assert_eq!(
            urls,
            vec![
                "example.com",
                "https://www.shop.example.org/cart",
                "csv.example.net"
            ]
        );
    }

    #[test]
    fn test_parse_domain_list_json() {
        let content = r#"["a.com", {"url": "https://b.com", "status_code": "OK"}]"#;
        let domains = parse_domain_list(content).unwrap();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[1].url(), "https://b.com");
    }

    #[test]
    fn test_parse_domain_list_invalid_json() {
        assert!(parse_domain_list("[1, 2").is_err());
    }
}
