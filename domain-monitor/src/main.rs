//! Domain Monitor CLI Application
//!
//! A command-line interface for checking HTTP reachability and TLS
//! certificate health of a list of domains, once or on a schedule.
//! This CLI application is a thin front end to domain-monitor-lib.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use domain_monitor_lib::{
    load_env_config, parse_domain_list, parse_timeout_string, run_schedule, BatchOutcome,
    CheckConfig, CheckRequest, ConfigManager, DomainChecker, DomainInput, DomainResult, EnvConfig,
    FileConfig, JsonFileStore, Schedule,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Storage directory used when neither the CLI, the environment nor a config
/// file names one.
const DEFAULT_JSON_DIRECTORY: &str = "./data";

/// CLI arguments for domain-monitor
#[derive(Parser, Debug)]
#[command(name = "domain-monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check HTTP reachability and TLS certificates for a list of domains")]
#[command(
    long_about = "Check HTTP reachability and TLS certificate health for a list of domains.\n\nEach domain must answer 200 on http://<host>; its certificate on port 443 is verified and the expiry date and issuer are reported. Checks run concurrently with an overall batch timeout, once or on a recurring schedule."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domains or URLs to check
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line, CSV, or a JSON array)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Owner the results are stored under
    #[arg(
        short = 'o',
        long = "owner",
        value_name = "NAME",
        default_value = "default",
        help_heading = "Domain Selection"
    )]
    pub owner: String,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Output results in CSV format
    #[arg(long = "csv", help_heading = "Output Format")]
    pub csv: bool,

    /// Group results by health with section headers
    #[arg(short = 'p', long = "pretty", help_heading = "Output Format")]
    pub pretty: bool,

    /// Max concurrent workers per batch (at least 1) [default: 10]
    #[arg(
        short = 'w',
        long = "max-workers",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub max_workers: Option<usize>,

    /// HTTP probe timeout, e.g. 5s, 500ms [default: 5s]
    #[arg(long = "http-timeout", value_name = "DURATION", help_heading = "Performance")]
    pub http_timeout: Option<String>,

    /// TLS connect and handshake timeout [default: 5s]
    #[arg(long = "ssl-timeout", value_name = "DURATION", help_heading = "Performance")]
    pub ssl_timeout: Option<String>,

    /// Wall-clock budget for a whole batch [default: 30s]
    #[arg(
        long = "overall-timeout",
        value_name = "DURATION",
        help_heading = "Performance"
    )]
    pub overall_timeout: Option<String>,

    /// Directory for per-owner result files [default: ./data]
    #[arg(long = "store", value_name = "DIR", help_heading = "Storage")]
    pub store: Option<String>,

    /// Do not write results to disk
    #[arg(long = "no-store", conflicts_with = "store", help_heading = "Storage")]
    pub no_store: bool,

    /// Print the owner's stored results instead of checking
    #[arg(
        long = "list",
        conflicts_with_all = ["domains", "file", "no_store", "every", "runs"],
        help_heading = "Storage"
    )]
    pub list: bool,

    /// Delete a stored result for the owner by its url
    #[arg(
        long = "remove",
        value_name = "URL",
        conflicts_with_all = ["domains", "file", "no_store", "every", "runs", "list"],
        help_heading = "Storage"
    )]
    pub remove: Option<String>,

    /// Rerun on a schedule: hourly, daily, daily@HH:MM (UTC), or an interval like 15m
    #[arg(long = "every", value_name = "SCHEDULE", help_heading = "Scheduling")]
    pub every: Option<String>,

    /// Stop after this many scheduled runs
    #[arg(long = "runs", value_name = "N", help_heading = "Scheduling")]
    pub runs: Option<usize>,

    /// Run once, ignoring any schedule from the config file
    #[arg(long = "once", conflicts_with = "every", help_heading = "Scheduling")]
    pub once: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Everything resolved from defaults, config files, environment and flags.
#[derive(Debug, Clone)]
struct Settings {
    check: CheckConfig,
    json_directory: Option<PathBuf>,
    schedule: Option<Schedule>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(args.verbose);
    debug!("domain-monitor v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_domain_monitor(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins, then `LOG_LEVEL`, then info (debug with `--verbose`) for
/// this crate and the library.
fn init_logging(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|level| EnvFilter::try_new(level.to_lowercase()).ok())
            .unwrap_or_else(|| EnvFilter::new(default_log_directive(verbose))),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_log_directive(verbose: bool) -> &'static str {
    if verbose {
        "domain_monitor=debug,domain_monitor_lib=debug"
    } else {
        "domain_monitor=info,domain_monitor_lib=info"
    }
}

fn validate_args(args: &Args) -> Result<(), String> {
    let store_command = args.list || args.remove.is_some();

    // Must have either domains or a file
    if !store_command && args.domains.is_empty() && args.file.is_none() {
        return Err("You must specify domains or a file with --file".to_string());
    }

    // Can't have multiple output formats
    if args.json && args.csv {
        return Err("Cannot specify multiple output formats (--json, --csv)".to_string());
    }

    if let Some(max_workers) = args.max_workers {
        if max_workers == 0 {
            return Err("Max workers must be at least 1".to_string());
        }
    }

    for (flag, value) in [
        ("--http-timeout", &args.http_timeout),
        ("--ssl-timeout", &args.ssl_timeout),
        ("--overall-timeout", &args.overall_timeout),
    ] {
        if let Some(timeout) = value {
            match parse_timeout_string(timeout) {
                Some(duration) if !duration.is_zero() => {}
                _ => {
                    return Err(format!(
                        "Invalid {} '{}'. Use format like '5s', '30s', '2m', '500ms'",
                        flag, timeout
                    ))
                }
            }
        }
    }

    if let Some(every) = &args.every {
        Schedule::parse(every).map_err(|e| e.to_string())?;
    }

    if args.runs == Some(0) {
        return Err("--runs must be at least 1".to_string());
    }

    if args.owner.trim().is_empty() {
        return Err("Owner cannot be empty".to_string());
    }

    Ok(())
}

async fn run_domain_monitor(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;

    if args.list || args.remove.is_some() {
        let directory = settings
            .json_directory
            .as_deref()
            .ok_or("Storage is disabled")?;
        return run_store_command(&args, directory).await;
    }

    let request = CheckRequest::new(get_domains_to_check(&args).await?, args.owner.clone());
    let domains = &request.domains;

    let mut checker = DomainChecker::with_config(settings.check.clone())?;
    if let Some(directory) = &settings.json_directory {
        debug!(directory = %directory.display(), "Storing results");
        checker = checker.with_sink(Arc::new(JsonFileStore::new(directory)));
    }

    match settings.schedule {
        Some(schedule) => {
            info!(
                owner = %args.owner,
                schedule = %schedule,
                "Checking {} domains {}",
                domains.len(),
                schedule
            );
            let runs = run_schedule(
                &checker,
                &request,
                schedule,
                args.runs,
                |outcome| {
                    if let Err(e) = display_results(outcome, &args) {
                        error!(error = %e, "Failed to display results");
                    }
                },
            )
            .await;
            debug!(runs, "Schedule complete");
        }
        None => {
            if args.runs.is_some() {
                return Err("--runs needs a schedule (--every or [schedule] every)".into());
            }

            let text_mode = !args.json && !args.csv;
            if text_mode && args.pretty {
                ui::print_header(
                    domains.len(),
                    settings.check.worker_count(domains.len()),
                    &args.owner,
                );
            }

            let spinner = if text_mode {
                ui::Spinner::start(format!("Checking {} domains...", domains.len()))
            } else {
                None
            };
            let outcome = checker.check_request(&request).await;
            if let Some(spinner) = spinner {
                spinner.stop().await;
            }

            display_results(&outcome, &args)?;
        }
    }

    Ok(())
}

/// Show or edit the owner's stored results.
async fn run_store_command(
    args: &Args,
    directory: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonFileStore::new(directory);

    if let Some(url) = &args.remove {
        if !store.remove_domain(&args.owner, url).await? {
            return Err(format!("No stored domain '{}' for owner '{}'", url, args.owner).into());
        }
        info!(owner = %args.owner, url = %url, "Removed stored domain");
        println!("Removed {} for {}", url, args.owner);
        return Ok(());
    }

    let stored = store.load_domains(&args.owner).await?;
    debug!(owner = %args.owner, count = stored.len(), "Loaded stored domains");

    if args.json {
        display_json_results(&stored)?;
    } else if args.csv {
        display_csv_results(&stored);
    } else if stored.is_empty() {
        println!("No stored domains for {}", args.owner);
    } else if args.pretty {
        ui::print_grouped_results(&stored);
    } else {
        for result in &stored {
            ui::print_result(result);
        }
    }

    Ok(())
}

/// Resolve settings with precedence: CLI > environment > config file > defaults.
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let env_config = load_env_config(args.verbose);
    let file_config = load_file_config(args, &env_config)?;

    let mut check = file_config.apply_to(CheckConfig::default());
    check = env_config.apply_to(check);
    check = apply_cli_args_to_config(check, args)?;
    check.validate()?;

    let json_directory = if args.no_store {
        None
    } else {
        let directory = args
            .store
            .clone()
            .or_else(|| env_config.json_directory.clone())
            .or_else(|| file_config.json_directory().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_JSON_DIRECTORY.to_string());
        Some(PathBuf::from(directory))
    };

    let schedule = if args.once {
        None
    } else {
        match args.every.as_deref().or_else(|| file_config.schedule_every()) {
            Some(every) => Some(Schedule::parse(every)?),
            None => None,
        }
    };

    Ok(Settings {
        check,
        json_directory,
        schedule,
    })
}

/// Load the explicit config file (CLI `--config`, then `DM_CONFIG`), or
/// discover one.
fn load_file_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    let explicit = args
        .config
        .as_ref()
        .map(|path| (path, "CLI --config"))
        .or_else(|| env_config.config.as_ref().map(|path| (path, "DM_CONFIG")));

    match explicit {
        Some((path, source)) => {
            debug!(path = %path, "Using explicit config file ({})", source);
            let file_config = config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;
            Ok(file_config)
        }
        None => Ok(config_manager.discover_and_load().unwrap_or_default()),
    }
}

/// Apply CLI arguments (highest precedence) to a config.
fn apply_cli_args_to_config(
    mut config: CheckConfig,
    args: &Args,
) -> Result<CheckConfig, Box<dyn std::error::Error>> {
    if let Some(max_workers) = args.max_workers {
        config = config.with_max_workers(max_workers);
    }
    if let Some(timeout) = &args.http_timeout {
        config = config.with_http_timeout(parse_cli_timeout(timeout)?);
    }
    if let Some(timeout) = &args.ssl_timeout {
        config = config.with_ssl_timeout(parse_cli_timeout(timeout)?);
    }
    if let Some(timeout) = &args.overall_timeout {
        config = config.with_overall_timeout(parse_cli_timeout(timeout)?);
    }
    Ok(config)
}

fn parse_cli_timeout(timeout: &str) -> Result<std::time::Duration, Box<dyn std::error::Error>> {
    let duration =
        parse_timeout_string(timeout).ok_or_else(|| format!("Invalid timeout '{}'", timeout))?;
    Ok(duration)
}

/// Collect domains from positional arguments and the input file.
async fn get_domains_to_check(
    args: &Args,
) -> Result<Vec<DomainInput>, Box<dyn std::error::Error>> {
    let mut domains: Vec<DomainInput> = args
        .domains
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(DomainInput::from)
        .collect();

    if let Some(file_path) = &args.file {
        domains.extend(read_domains_from_file(file_path).await?);
    }

    if domains.is_empty() {
        return Err("No domains to check.".into());
    }

    Ok(domains)
}

async fn read_domains_from_file(
    file_path: &str,
) -> Result<Vec<DomainInput>, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| format!("Cannot read '{}': {}", file_path, e))?;

    let domains = parse_domain_list(&content)
        .map_err(|e| format!("Invalid domain file '{}': {}", file_path, e))?;

    if domains.is_empty() {
        return Err(format!("No domains found in '{}'", file_path).into());
    }

    debug!(file = %file_path, count = domains.len(), "Loaded domains from file");
    Ok(domains)
}

fn display_results(
    outcome: &BatchOutcome,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.json {
        display_json_results(&outcome.results)?;
    } else if args.csv {
        display_csv_results(&outcome.results);
    } else {
        display_text_results(outcome, args);
    }

    Ok(())
}

/// Display results in JSON format
fn display_json_results(results: &[DomainResult]) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(results)?;
    println!("{}", json);
    Ok(())
}

/// Display results in CSV format
fn display_csv_results(results: &[DomainResult]) {
    println!("url,status_code,ssl_status,expiration_date,issuer");
    for result in results {
        println!("{}", csv_line(result));
    }
}

fn csv_line(result: &DomainResult) -> String {
    [
        csv_field(&result.url),
        result.status_code.to_string(),
        result.ssl_status.to_string(),
        csv_field(&result.expiration_date),
        csv_field(&result.issuer),
    ]
    .join(",")
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Display results in human-readable text format
fn display_text_results(outcome: &BatchOutcome, args: &Args) {
    if args.pretty {
        ui::print_grouped_results(&outcome.results);
    } else {
        for result in &outcome.results {
            ui::print_result(result);
        }
    }

    if outcome.results.len() > 1 || !outcome.is_complete() {
        println!();
        ui::print_summary(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_monitor_lib::{PersistenceSink, SslStatus, StatusCode};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_test_args() -> Args {
        Args {
            domains: vec!["example.com".to_string()],
            file: None,
            owner: "default".to_string(),
            json: false,
            csv: false,
            pretty: false,
            max_workers: None,
            http_timeout: None,
            ssl_timeout: None,
            overall_timeout: None,
            store: None,
            no_store: false,
            list: false,
            remove: None,
            every: None,
            runs: None,
            once: false,
            config: None,
            verbose: false,
        }
    }

    #[test]
    fn test_validate_args_requires_domains() {
        let args = Args {
            domains: vec![],
            ..create_test_args()
        };
        assert!(validate_args(&args).is_err());

        let args = Args {
            domains: vec![],
            file: Some("domains.txt".to_string()),
            ..create_test_args()
        };
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_store_commands_need_no_domains() {
        let args = Args {
            domains: vec![],
            list: true,
            ..create_test_args()
        };
        assert!(validate_args(&args).is_ok());

        let args = Args {
            domains: vec![],
            remove: Some("example.com".to_string()),
            ..create_test_args()
        };
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_run_store_command_removes_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        tokio_test::block_on(store.upsert_domains(
            &[DomainResult::failed("a.com"), DomainResult::failed("b.com")],
            "olga",
        ))
        .unwrap();

        let args = Args {
            domains: vec![],
            owner: "olga".to_string(),
            remove: Some("a.com".to_string()),
            ..create_test_args()
        };
        tokio_test::block_on(run_store_command(&args, dir.path())).unwrap();
        let left = tokio_test::block_on(store.load_domains("olga")).unwrap();
        assert_eq!(left, vec![DomainResult::failed("b.com")]);

        let err = tokio_test::block_on(run_store_command(&args, dir.path())).unwrap_err();
        assert!(err.to_string().contains("No stored domain 'a.com'"));
    }

    #[test]
    fn test_validate_args_output_conflict() {
        let args = Args {
            json: true,
            csv: true,
            ..create_test_args()
        };
        assert!(validate_args(&args).unwrap_err().contains("multiple output formats"));
    }

    #[test]
    fn test_validate_args_max_workers_range() {
        for (value, ok) in [(0, false), (1, true), (100, true), (150, true)] {
            let args = Args {
                max_workers: Some(value),
                ..create_test_args()
            };
            assert_eq!(validate_args(&args).is_ok(), ok, "max_workers={}", value);
        }
    }

    #[test]
    fn test_validate_args_timeouts_and_schedule() {
        let args = Args {
            ssl_timeout: Some("fast".to_string()),
            ..create_test_args()
        };
        assert!(validate_args(&args).unwrap_err().contains("--ssl-timeout"));

        let args = Args {
            every: Some("fortnightly".to_string()),
            ..create_test_args()
        };
        assert!(validate_args(&args).is_err());

        let args = Args {
            every: Some("daily@06:15".to_string()),
            runs: Some(2),
            ..create_test_args()
        };
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_apply_cli_args_to_config() {
        let args = Args {
            max_workers: Some(3),
            http_timeout: Some("2s".to_string()),
            overall_timeout: Some("500ms".to_string()),
            ..create_test_args()
        };
        let config = apply_cli_args_to_config(CheckConfig::default(), &args).unwrap();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.http_timeout, Duration::from_secs(2));
        assert_eq!(config.ssl_timeout, Duration::from_secs(5));
        assert_eq!(config.overall_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_build_settings_cli_beats_config_file() {
        let mut config_file = NamedTempFile::new().unwrap();
        writeln!(
            config_file,
            "[checks]\nmax_workers = 4\nssl_timeout = \"9s\"\n\n[storage]\njson_directory = \"/from/file\"\n\n[schedule]\nevery = \"hourly\""
        )
        .unwrap();

        let args = Args {
            max_workers: Some(7),
            config: Some(config_file.path().to_string_lossy().to_string()),
            ..create_test_args()
        };
        let settings = build_settings(&args).unwrap();
        assert_eq!(settings.check.max_workers, 7);
        assert_eq!(settings.check.ssl_timeout, Duration::from_secs(9));
        assert_eq!(settings.schedule, Some(Schedule::Hourly));

        let args = Args {
            once: true,
            no_store: true,
            ..args
        };
        let settings = build_settings(&args).unwrap();
        assert_eq!(settings.schedule, None);
        assert_eq!(settings.json_directory, None);
    }

    #[test]
    fn test_build_settings_rejects_missing_config() {
        let args = Args {
            config: Some("/nonexistent/domain-monitor.toml".to_string()),
            ..create_test_args()
        };
        let err = build_settings(&args).unwrap_err();
        assert!(err.to_string().contains("Failed to load config file"));
    }

    #[test]
    fn test_read_domains_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# monitored sites\nexample.com\nhttps://www.rust-lang.org,team\n").unwrap();

        let args = Args {
            domains: vec!["extra.io".to_string()],
            file: Some(file.path().to_string_lossy().to_string()),
            ..create_test_args()
        };
        let domains = tokio_test::block_on(get_domains_to_check(&args)).unwrap();
        let urls: Vec<&str> = domains.iter().map(|d| d.url()).collect();
        assert_eq!(urls, vec!["extra.io", "example.com", "https://www.rust-lang.org"]);
    }

    #[test]
    fn test_read_domains_from_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let result = tokio_test::block_on(read_domains_from_file(&file.path().to_string_lossy()));
        assert!(result.is_err());
    }

    #[test]
    fn test_csv_line_quotes_fields() {
        let result = DomainResult {
            url: "example.com".to_string(),
            status_code: StatusCode::Ok,
            ssl_status: SslStatus::Valid,
            expiration_date: "2030-01-01 00:00:00".to_string(),
            issuer: "Example, Inc. \"CA\"".to_string(),
        };
        assert_eq!(
            csv_line(&result),
            "example.com,OK,valid,2030-01-01 00:00:00,\"Example, Inc. \"\"CA\"\"\""
        );
        assert_eq!(
            csv_line(&DomainResult::failed("down.com")),
            "down.com,FAILED,unknown,unknown,unknown"
        );
    }

    #[test]
    fn test_default_log_directive() {
        assert!(default_log_directive(false).contains("=info"));
        assert!(default_log_directive(true).contains("=debug"));
    }
}
