//! JSON run reports.
//!
//! Files are organized by the local date of the run:
//! `{report_dir}/{YYYY-MM-DD}/{HHMMSS}.json`.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::events::PhaseEvent;
use crate::models::{PipelineSummary, RunRequest};

/// Everything known about one finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub request: RunRequest,
    pub summary: PipelineSummary,
    pub timeline: Vec<PhaseEvent>,
}

/// Path the report for a run started at `started_at` is written to.
pub fn report_path(report_dir: &Path, started_at: &DateTime<Local>) -> PathBuf {
    report_dir
        .join(started_at.format("%Y-%m-%d").to_string())
        .join(format!("{}.json", started_at.format("%H%M%S")))
}

/// Write `report` under `report_dir`, creating the date directory as needed.
#[instrument(level = "info", skip_all, fields(report_dir = %report_dir.display()))]
pub async fn write_run_report(report: &RunReport, report_dir: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(report_dir, &report.started_at);

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run report");
    Ok(path)
}
