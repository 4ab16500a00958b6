//! Single runs and the daily schedule.

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use std::path::Path;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::events::CollectingObserver;
use crate::models::{PipelineSummary, RunRequest};
use crate::outputs::json::{RunReport, write_run_report};
use crate::pipeline::Pipeline;

/// Run one pass and, when `report_dir` is given, write its JSON report.
///
/// A report that cannot be written is logged; it does not fail the run.
#[instrument(level = "info", skip(pipeline, request))]
pub async fn run_once(
    pipeline: &Pipeline,
    request: &RunRequest,
    report_dir: Option<&Path>,
) -> Result<PipelineSummary> {
    let started_at = Local::now();
    let observer = CollectingObserver::default();
    let summary = pipeline.run_pipeline(request, &observer).await?;

    if let Some(dir) = report_dir {
        let report = RunReport {
            started_at,
            request: request.clone(),
            summary: summary.clone(),
            timeline: observer.events(),
        };
        if let Err(e) = write_run_report(&report, dir).await {
            error!(error = %e, "Failed to write run report");
        }
    }
    Ok(summary)
}

/// The first moment strictly after `now` whose local time of day is `at`.
///
/// Days on which `at` does not exist (a DST gap) are skipped; on days where
/// it occurs twice the earlier instant is used.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    for offset in 0..=2 {
        let Some(day) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
    }
    now.clone() + chrono::Duration::days(1)
}

/// Run the pipeline every day at `at` local time, forever.
///
/// A failed run is logged and the loop waits for the next slot.
pub async fn run_daily(
    pipeline: &Pipeline,
    request: &RunRequest,
    at: NaiveTime,
    report_dir: Option<&Path>,
) {
    info!(%at, sources = ?request.sources, "Scheduler started");
    loop {
        let now = Local::now();
        let next = next_daily_run(&now, at);
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(next_run = %next.to_rfc3339(), wait_secs = wait.as_secs(), "Waiting for next scheduled run");
        tokio::time::sleep(wait).await;

        match run_once(pipeline, request, report_dir).await {
            Ok(summary) => info!(
                new_documents = summary.new_documents,
                failed_sources = summary.failed_sources.len(),
                "Scheduled run finished"
            ),
            Err(e) => error!(error = %e, "Scheduled run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_later_today() {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 8, 15, 0).unwrap();
        assert_eq!(
            next_daily_run(&now, at(10, 0)),
            Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tomorrow_once_passed() {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(&now, at(10, 0)),
            Utc.with_ymd_and_hms(2025, 5, 7, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_crosses_month_end() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(
            next_daily_run(&now, at(7, 30)),
            Utc.with_ymd_and_hms(2026, 1, 1, 7, 30, 0).unwrap()
        );
    }
}
