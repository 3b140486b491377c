//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and the
//! environment, and layering both onto a [`CheckConfig`] with proper
//! precedence rules (environment over file over defaults).

use crate::error::DomainMonitorError;
use crate::types::CheckConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [checks]
/// max_workers = 20
/// http_timeout = "3s"
/// ssl_timeout = "5s"
/// overall_timeout = "1m"
///
/// [storage]
/// json_directory = "/var/lib/domain-monitor"
///
/// [schedule]
/// every = "daily@09:30"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Worker and timeout settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<ChecksConfig>,

    /// Where per-owner result files live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Default recurring schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleConfig>,
}

/// Check engine settings that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChecksConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Timeouts as strings, e.g. "5s", "2m", "500ms"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_timeout: Option<String>,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_directory: Option<String>,
}

/// Schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    /// "hourly", "daily", "daily@HH:MM" or an interval like "15m"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
}

impl FileConfig {
    /// Layer the `[checks]` section onto `config`.
    ///
    /// Values are validated at load time, so anything unparseable here is
    /// simply skipped.
    pub fn apply_to(&self, mut config: CheckConfig) -> CheckConfig {
        let Some(checks) = &self.checks else {
            return config;
        };

        if let Some(max_workers) = checks.max_workers {
            config = config.with_max_workers(max_workers);
        }
        if let Some(timeout) = checks.http_timeout.as_deref().and_then(parse_timeout_string) {
            config = config.with_http_timeout(timeout);
        }
        if let Some(timeout) = checks.ssl_timeout.as_deref().and_then(parse_timeout_string) {
            config = config.with_ssl_timeout(timeout);
        }
        if let Some(timeout) = checks
            .overall_timeout
            .as_deref()
            .and_then(parse_timeout_string)
        {
            config = config.with_overall_timeout(timeout);
        }
        config
    }

    pub fn json_directory(&self) -> Option<&str> {
        self.storage.as_ref()?.json_directory.as_deref()
    }

    pub fn schedule_every(&self) -> Option<&str> {
        self.schedule.as_ref()?.every.as_deref()
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if reading, parsing or
    /// validation fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainMonitorError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DomainMonitorError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DomainMonitorError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            DomainMonitorError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "Loaded configuration file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config < home directory config < current directory config.
    /// Files that fail to load are skipped.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainMonitorError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping configuration file"),
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            for (i, path) in loaded_files.iter().enumerate() {
                let status = if i == loaded_files.len() - 1 {
                    "highest precedence"
                } else {
                    "overridden where set above"
                };
                info!(path = %path.display(), "Configuration file ({})", status);
            }
        }

        Ok(merged_config)
    }

    /// Configuration file in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./domain-monitor.toml", "./.domain-monitor.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Configuration file in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-monitor.toml", "domain-monitor.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-monitor").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            checks: match (lower.checks, higher.checks) {
                (Some(mut lower_checks), Some(higher_checks)) => {
                    if higher_checks.max_workers.is_some() {
                        lower_checks.max_workers = higher_checks.max_workers;
                    }
                    if higher_checks.http_timeout.is_some() {
                        lower_checks.http_timeout = higher_checks.http_timeout;
                    }
                    if higher_checks.ssl_timeout.is_some() {
                        lower_checks.ssl_timeout = higher_checks.ssl_timeout;
                    }
                    if higher_checks.overall_timeout.is_some() {
                        lower_checks.overall_timeout = higher_checks.overall_timeout;
                    }
                    Some(lower_checks)
                }
                (lower_checks, higher_checks) => higher_checks.or(lower_checks),
            },
            storage: match (lower.storage, higher.storage) {
                (Some(lower_storage), Some(higher_storage)) => Some(StorageConfig {
                    json_directory: higher_storage.json_directory.or(lower_storage.json_directory),
                }),
                (lower_storage, higher_storage) => higher_storage.or(lower_storage),
            },
            schedule: match (lower.schedule, higher.schedule) {
                (Some(lower_schedule), Some(higher_schedule)) => Some(ScheduleConfig {
                    every: higher_schedule.every.or(lower_schedule.every),
                }),
                (lower_schedule, higher_schedule) => higher_schedule.or(lower_schedule),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), DomainMonitorError> {
        if let Some(checks) = &config.checks {
            if let Some(max_workers) = checks.max_workers {
                if max_workers == 0 {
                    return Err(DomainMonitorError::config("max_workers must be at least 1"));
                }
            }

            for (name, value) in [
                ("http_timeout", &checks.http_timeout),
                ("ssl_timeout", &checks.ssl_timeout),
                ("overall_timeout", &checks.overall_timeout),
            ] {
                if let Some(timeout_str) = value {
                    match parse_timeout_string(timeout_str) {
                        Some(timeout) if !timeout.is_zero() => {}
                        _ => {
                            return Err(DomainMonitorError::config(format!(
                                "Invalid {} '{}'. Use format like '5s', '30s', '2m', '500ms'",
                                name, timeout_str
                            )));
                        }
                    }
                }
            }
        }

        if let Some(directory) = config.json_directory() {
            if directory.trim().is_empty() {
                return Err(DomainMonitorError::config(
                    "storage.json_directory cannot be empty",
                ));
            }
        }

        if let Some(every) = config.schedule_every() {
            crate::schedule::Schedule::parse(every)?;
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    /// `MAX_WORKERS`
    pub max_workers: Option<usize>,
    /// `HTTP_TIMEOUT`
    pub http_timeout: Option<Duration>,
    /// `SSL_TIMEOUT`
    pub ssl_timeout: Option<Duration>,
    /// `OVERALL_CHECK_TIMEOUT`
    pub overall_timeout: Option<Duration>,
    /// `JSON_DIRECTORY`
    pub json_directory: Option<String>,
    /// `DM_CONFIG`
    pub config: Option<String>,
}

impl EnvConfig {
    /// Layer the environment values onto `config`.
    pub fn apply_to(&self, mut config: CheckConfig) -> CheckConfig {
        if let Some(max_workers) = self.max_workers {
            config = config.with_max_workers(max_workers);
        }
        if let Some(timeout) = self.http_timeout {
            config = config.with_http_timeout(timeout);
        }
        if let Some(timeout) = self.ssl_timeout {
            config = config.with_ssl_timeout(timeout);
        }
        if let Some(timeout) = self.overall_timeout {
            config = config.with_overall_timeout(timeout);
        }
        config
    }
}

/// Load configuration from environment variables.
///
/// Invalid values are logged as warnings and ignored.
///
/// # Arguments
///
/// * `verbose` - Whether to log each variable that was picked up
pub fn load_env_config(verbose: bool) -> EnvConfig {
    env_config_from(|name| env::var(name).ok(), verbose)
}

/// Build an [`EnvConfig`] from an arbitrary variable lookup.
fn env_config_from<F>(lookup: F, verbose: bool) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();
    let report = |name: &str, value: &str| {
        if verbose {
            info!("Using {}={}", name, value);
        }
    };

    // MAX_WORKERS - upper bound on concurrent workers
    if let Some(val) = lookup("MAX_WORKERS") {
        match val.trim().parse::<usize>() {
            Ok(max_workers) if max_workers >= 1 => {
                env_config.max_workers = Some(max_workers);
                report("MAX_WORKERS", &val);
            }
            _ => warn!("Invalid MAX_WORKERS='{}', must be at least 1", val),
        }
    }

    for (name, slot) in [
        ("HTTP_TIMEOUT", &mut env_config.http_timeout),
        ("SSL_TIMEOUT", &mut env_config.ssl_timeout),
        ("OVERALL_CHECK_TIMEOUT", &mut env_config.overall_timeout),
    ] {
        if let Some(val) = lookup(name) {
            match parse_timeout_string(&val) {
                Some(timeout) if !timeout.is_zero() => {
                    *slot = Some(timeout);
                    report(name, &val);
                }
                _ => warn!(
                    "Invalid {}='{}', use format like '5s', '30s', '2m'",
                    name, val
                ),
            }
        }
    }

    // JSON_DIRECTORY - where per-owner result files are written
    if let Some(directory) = lookup("JSON_DIRECTORY") {
        if !directory.trim().is_empty() {
            report("JSON_DIRECTORY", &directory);
            env_config.json_directory = Some(directory);
        }
    }

    // DM_CONFIG - explicit config file
    if let Some(config_path) = lookup("DM_CONFIG") {
        if !config_path.trim().is_empty() {
            report("DM_CONFIG", &config_path);
            env_config.config = Some(config_path);
        }
    }

    env_config
}

/// Parse a timeout string like "500ms", "5s", "2m" or a bare number of seconds.
pub fn parse_timeout_string(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    if let Some(ms) = timeout_str.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = timeout_str.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        // Assume seconds if no unit
        timeout_str.parse::<u64>().ok().map(Duration::from_secs)
    }
}
