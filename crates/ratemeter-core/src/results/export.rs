use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::Report;
use crate::error::RatemeterError;

/// Prefix of every report file name.
pub const REPORT_PREFIX: &str = "benchmark_";

const WRITE_CHECK_FILE: &str = ".ratemeter-write-check";

/// Give up on finding a free report name after this many suffixes.
const MAX_NAME_ATTEMPTS: u32 = 100;

// ---------------------------------------------------------------------------
// JSON report
// ---------------------------------------------------------------------------

/// Export a report as pretty-printed JSON.
pub fn export_json(report: &Report) -> Result<String, RatemeterError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// `benchmark_<YYYY-MM-DD_HH-MM-SS>.json` for the given instant.
pub fn report_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{REPORT_PREFIX}{}.json", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Name for the `attempt`-th try: the plain name first, then `_1`, `_2`, ...
fn numbered_file_name(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    match base.strip_suffix(".json") {
        Some(stem) => format!("{stem}_{attempt}.json"),
        None => format!("{base}_{attempt}"),
    }
}

/// Create `dir` if needed and make sure files can be created in it.
pub async fn prepare_report_dir(dir: impl AsRef<Path>) -> Result<(), RatemeterError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let check = dir.join(WRITE_CHECK_FILE);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&check)
        .await?;
    tokio::fs::remove_file(&check).await?;
    Ok(())
}

/// Write `report` into `dir`, creating the directory if needed.
///
/// The file is named after the report's finish time in local time. An
/// existing report is never overwritten; a numeric suffix is added instead.
/// Returns the path written.
pub async fn write_report(report: &Report, dir: impl AsRef<Path>) -> Result<PathBuf, RatemeterError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let finished = report.finished_at.with_timezone(&Local);
    let base = report_file_name(&finished);
    let content = export_json(report)?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(numbered_file_name(&base, attempt));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        tracing::info!("Saved benchmark report to {}", path.display());
        return Ok(path);
    }

    Err(RatemeterError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free report file name for {base} in {}", dir.display()),
    )))
}

// ---------------------------------------------------------------------------
// Console summary
// ---------------------------------------------------------------------------

/// Human-readable rendering of the report figures.
pub fn render_summary(report: &Report) -> String {
    let speed = report.average_gather_speed;
    let mut out = String::new();

    out.push_str("Speed Results:\n");
    out.push_str(&format!(
        "- Averaging {speed} UIDs/s with an average gather time of {:.2} seconds\n",
        report.average_gather_time
    ));
    out.push_str(&format!(
        "- (Requests Only: Averaging {} UIDs/s with an average response time of {:.2} seconds)\n",
        report.average_requests_only_speed, report.average_requests_only_time
    ));
    out.push_str(&format!(
        "- This speed is equal to {:.3} UIDs/min, {:.3} UIDs/h, {:.3} UIDs/day\n",
        speed * 60.0,
        speed * 3600.0,
        speed * 86_400.0
    ));

    out.push_str("Requests Results:\n");
    out.push_str(&format!(
        "- Encountered an unusual response time {} times\n",
        report.unusual_response_time
    ));
    out.push_str(&format!(
        "- Confirmed rate limiting {} times\n",
        report.confirmed_rate_limit_count
    ));
    out.push_str(&format!(
        "- Lost {} UIDs ({:.2}%) to rate limiting\n",
        report.uids_lost_to_rate_limiting, report.loss_percentage
    ));
    out.push_str(&format!(
        "- Lost {} UIDs to transport errors\n",
        report.uids_lost_to_transport_errors
    ));
    if report.parse_error_count > 0 {
        out.push_str(&format!(
            "- {} responses had an unusable body\n",
            report.parse_error_count
        ));
    }
    out.push_str(&format!(
        "This benchmark took {:.2} seconds\n",
        report.benchmark_duration_secs
    ));

    out
}
