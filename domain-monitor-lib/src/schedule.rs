//! Recurring batch checks.
//!
//! A [`Schedule`] says when the next batch is due; [`run_schedule`] drives a
//! [`DomainChecker`] through successive batches, one at a time.

use crate::checker::DomainChecker;
use crate::config::parse_timeout_string;
use crate::error::DomainMonitorError;
use crate::types::{BatchOutcome, CheckRequest};
use chrono::{DateTime, NaiveTime, TimeDelta, Timelike, Utc};
use std::fmt;
use std::time::Duration;
use tracing::info;

/// When a recurring check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// At the top of every hour (UTC)
    Hourly,

    /// Once a day at the given UTC time
    Daily { hour: u32, minute: u32 },

    /// At a fixed interval after the previous run finished
    Every(Duration),
}

impl Schedule {
    /// Parse `"hourly"`, `"daily"`, `"daily@HH:MM"` or an interval such as
    /// `"15m"` / `"30s"`.
    ///
    /// ```rust
    /// use domain_monitor_lib::Schedule;
    /// use std::time::Duration;
    ///
    /// assert_eq!(Schedule::parse("daily@09:30").unwrap(), Schedule::Daily { hour: 9, minute: 30 });
    /// assert_eq!(Schedule::parse("15m").unwrap(), Schedule::Every(Duration::from_secs(900)));
    /// ```
    pub fn parse(input: &str) -> Result<Self, DomainMonitorError> {
        let value = input.trim().to_lowercase();

        match value.as_str() {
            "hourly" => return Ok(Schedule::Hourly),
            "daily" => return Ok(Schedule::Daily { hour: 0, minute: 0 }),
            _ => {}
        }

        if let Some(at) = value.strip_prefix("daily@") {
            let time = NaiveTime::parse_from_str(at, "%H:%M").map_err(|_| {
                DomainMonitorError::config(format!(
                    "Invalid daily time '{}'. Use HH:MM (UTC), e.g. daily@09:30",
                    at
                ))
            })?;
            return Ok(Schedule::Daily {
                hour: time.hour(),
                minute: time.minute(),
            });
        }

        match parse_timeout_string(&value) {
            Some(interval) if !interval.is_zero() => Ok(Schedule::Every(interval)),
            _ => Err(DomainMonitorError::config(format!(
                "Invalid schedule '{}'. Use 'hourly', 'daily', 'daily@HH:MM' or an interval like '15m'",
                input
            ))),
        }
    }

    /// The first run time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::Hourly => {
                let top = now
                    .with_minute(0)
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(now);
                top + TimeDelta::hours(1)
            }
            Schedule::Daily { hour, minute } => {
                let at = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
                let today = now.date_naive().and_time(at).and_utc();
                if today > now {
                    today
                } else {
                    today + TimeDelta::days(1)
                }
            }
            Schedule::Every(interval) => TimeDelta::from_std(interval)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Hourly => write!(f, "hourly"),
            Schedule::Daily { hour, minute } => write!(f, "daily@{:02}:{:02}", hour, minute),
            Schedule::Every(interval) => write!(f, "every {:?}", interval),
        }
    }
}

/// Run batches for the request's owner on `schedule` until `max_runs` batches have
/// completed (`None` runs forever).
///
/// The first batch runs immediately. Batches never overlap: the next run time
/// is computed after the previous batch returns, so ticks missed while a slow
/// batch was running collapse into one. `on_run` sees every outcome.
///
/// Returns the number of completed runs.
pub async fn run_schedule<F>(
    checker: &DomainChecker,
    request: &CheckRequest,
    schedule: Schedule,
    max_runs: Option<usize>,
    mut on_run: F,
) -> usize
where
    F: FnMut(&BatchOutcome),
{
    let owner = request.owner.as_str();
    let mut completed = 0usize;

    loop {
        let outcome = checker.check_request(request).await;
        completed += 1;
        on_run(&outcome);

        if max_runs.is_some_and(|max| completed >= max) {
            info!(owner = %owner, runs = completed, "Schedule finished");
            return completed;
        }

        let now = Utc::now();
        let next = schedule.next_run_after(now);
        info!(
            owner = %owner,
            run = completed,
            ok = outcome.ok_count(),
            total = outcome.actual_count,
            next_run = %next.format("%Y-%m-%d %H:%M:%S"),
            "Scheduled run {} complete, next run at {} UTC",
            completed,
            next.format("%Y-%m-%d %H:%M:%S")
        );

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
    }
}
