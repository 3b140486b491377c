//! Text-mode display logic for the domain-monitor CLI.
//!
//! This module handles colored result lines, grouped output for `--pretty`,
//! the spinner shown while a batch runs, and the summary bar. Uses only the
//! `console` crate.

use console::{pad_str, style, Alignment, Term};
use domain_monitor_lib::{BatchOutcome, DomainResult, SslStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a spinner with the given message, or `None` when stderr is not
    /// a terminal.
    pub fn start(message: String) -> Option<Self> {
        if !Term::stderr().is_term() {
            return None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a `--pretty` run.
pub fn print_header(domain_count: usize, workers: usize, owner: &str) {
    println!(
        "{} {} {}",
        style("domain-monitor").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Checking {} domain{} for {}",
            domain_count,
            if domain_count == 1 { "" } else { "s" },
            owner
        ))
        .dim(),
    );
    println!("{}", style(format!("Workers: {}", workers)).dim());
    println!();
}

// ── Single result line ───────────────────────────────────────────────────────

/// Format and print a single domain result with colors and alignment.
pub fn print_result(result: &DomainResult) {
    let padded_url = pad_str(&result.url, 36, Alignment::Left, Some(".."));

    if result.is_ok() {
        println!(
            "  {}  {}  {}  {}",
            style(&padded_url).white(),
            style("OK").green().bold(),
            styled_ssl(result.ssl_status),
            style(certificate_summary(result)).dim(),
        );
    } else {
        println!(
            "  {}  {}",
            style(&padded_url).white(),
            style("FAILED").red().bold(),
        );
    }
}

// ── Grouped output ───────────────────────────────────────────────────────────

/// Print results grouped by health: Healthy, Certificate problems,
/// Unreachable. Empty sections are omitted entirely.
pub fn print_grouped_results(results: &[DomainResult]) {
    let (healthy, cert_problems, unreachable) = group_results(results);

    if !healthy.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Healthy ({}) ", healthy.len())).green().bold(),
            style("─".repeat(42)).green().dim(),
        );
        for r in &healthy {
            print_grouped_line(r);
        }
        println!();
    }

    if !cert_problems.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Certificate problems ({}) ", cert_problems.len()))
                .yellow()
                .bold(),
            style("─".repeat(29)).yellow().dim(),
        );
        for r in &cert_problems {
            print_grouped_line(r);
        }
        println!();
    }

    if !unreachable.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Unreachable ({}) ", unreachable.len()))
                .red()
                .bold(),
            style("─".repeat(38)).red().dim(),
        );
        for r in &unreachable {
            print_grouped_line(r);
        }
        println!();
    }
}

/// Split results into healthy, reachable-with-bad-certificate, and unreachable.
fn group_results(
    results: &[DomainResult],
) -> (Vec<&DomainResult>, Vec<&DomainResult>, Vec<&DomainResult>) {
    let mut healthy = Vec::new();
    let mut cert_problems = Vec::new();
    let mut unreachable = Vec::new();

    for r in results {
        match (r.is_ok(), r.ssl_status) {
            (true, SslStatus::Valid) => healthy.push(r),
            (true, _) => cert_problems.push(r),
            (false, _) => unreachable.push(r),
        }
    }

    (healthy, cert_problems, unreachable)
}

fn print_grouped_line(result: &DomainResult) {
    let padded = pad_str(&result.url, 36, Alignment::Left, Some(".."));
    if result.is_ok() {
        println!(
            "    {}  {}",
            style(&padded).white(),
            style(certificate_summary(result)).dim()
        );
    } else {
        println!("    {}", style(&padded).white());
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts, plus a note when the
/// batch deadline dropped checks.
pub fn print_summary(outcome: &BatchOutcome) {
    let total = outcome.actual_count;
    let ok = outcome.ok_count();
    let valid = outcome
        .results
        .iter()
        .filter(|r| r.ssl_status == SslStatus::Valid)
        .count();

    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        outcome.duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} reachable", ok)).green(),
        style("|").dim(),
        style(format!("{} valid certificates", valid)).cyan(),
        style("|").dim(),
        style(format!("{} failed", total - ok)).red(),
    );

    if let Some(note) = lost_note(outcome) {
        println!("  {}", style(note).yellow());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn styled_ssl(status: SslStatus) -> console::StyledObject<String> {
    let label = format!("ssl:{}", status);
    match status {
        SslStatus::Valid => style(label).green(),
        SslStatus::Failed => style(label).yellow(),
        SslStatus::Unknown => style(label).dim(),
    }
}

/// Expiry and issuer as a short string.
pub fn certificate_summary(result: &DomainResult) -> String {
    match result.ssl_status {
        SslStatus::Valid => format!("expires {} | {}", result.expiration_date, result.issuer),
        SslStatus::Failed => "certificate could not be verified".to_string(),
        SslStatus::Unknown => "no certificate data".to_string(),
    }
}

/// Warning shown when results were lost to the batch deadline.
fn lost_note(outcome: &BatchOutcome) -> Option<String> {
    match outcome.lost_count() {
        0 => None,
        lost => Some(format!(
            "{} of {} checks did not finish before the overall timeout",
            lost, outcome.expected_count
        )),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
