pub mod export;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BenchmarkConfig;
use crate::engine::counters::CounterSnapshot;
use crate::engine::stats::StatsSnapshot;

pub use export::{export_json, prepare_report_dir, render_summary, report_file_name, write_report};

// ---------------------------------------------------------------------------
// SampleResult
// ---------------------------------------------------------------------------

/// Timing and throughput of one completed sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SampleResult {
    /// Zero-based sample number.
    pub index: u32,
    /// Wall time from the first request issued to the last worker returning.
    pub elapsed_secs: f64,
    /// IDs per second over the sample's wall time.
    pub throughput_by_elapsed: f64,
    /// IDs per second if every request took the running average latency.
    pub throughput_by_latency: f64,
    /// Running average latency when the sample finished.
    pub average_latency_secs: f64,
    pub successes: u32,
    pub rate_limited: u32,
    pub suspected: u32,
    pub transport_errors: u32,
    pub parse_errors: u32,
}

/// `ids / secs`, or 0 when no time was measured.
pub fn per_second(ids: u64, secs: f64) -> f64 {
    if secs > 0.0 {
        ids as f64 / secs
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Wall-clock bounds of a finished session.
#[derive(Debug, Clone, Copy)]
pub struct RunTiming {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Write-once summary of a benchmark session.
///
/// Field names follow the JSON report format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Report {
    pub run_id: Uuid,
    pub target: String,
    pub batch_size: u32,
    pub concurrent_requests: u32,
    pub sample_count: u32,
    /// Configured per-worker pacing delay, in seconds.
    pub min_time_before_data_return: f64,
    /// Mean IDs/s over sample wall time.
    pub average_gather_speed: f64,
    /// Mean sample wall time, in seconds.
    pub average_gather_time: f64,
    /// Mean IDs/s derived from response latency alone.
    pub average_requests_only_speed: f64,
    /// Mean response latency, in seconds.
    pub average_requests_only_time: f64,
    /// Suspected rate limits (latency over threshold).
    pub unusual_response_time: u64,
    pub confirmed_rate_limit_count: u64,
    pub uids_lost_to_rate_limiting: u64,
    pub uids_lost_to_transport_errors: u64,
    pub parse_error_count: u64,
    pub total_uids: u64,
    /// Share of all requested IDs lost to confirmed rate limiting.
    pub loss_percentage: f64,
    pub benchmark_duration_secs: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub samples: Vec<SampleResult>,
}

impl Report {
    /// Aggregate per-sample results and the session's shared state.
    pub fn build(
        config: &BenchmarkConfig,
        samples: Vec<SampleResult>,
        stats: StatsSnapshot,
        counters: CounterSnapshot,
        timing: RunTiming,
    ) -> Self {
        let gather_speed = mean(samples.iter().map(|s| s.throughput_by_elapsed));
        let requests_only_speed = mean(samples.iter().map(|s| s.throughput_by_latency));
        let gather_time = mean(samples.iter().map(|s| s.elapsed_secs));
        let latency = if stats.count > 0 {
            stats.average_secs
        } else {
            0.0
        };

        let total_uids = config.total_ids();
        let loss_percentage = if total_uids > 0 {
            counters.loss_count as f64 / total_uids as f64 * 100.0
        } else {
            0.0
        };

        Self {
            run_id: Uuid::new_v4(),
            target: config.target.clone(),
            batch_size: config.batch_size,
            concurrent_requests: config.concurrent_requests,
            sample_count: config.sample_count,
            min_time_before_data_return: config.rate_limit_delay_secs,
            average_gather_speed: round_to(gather_speed, 3),
            average_gather_time: round_to(gather_time, 2),
            average_requests_only_speed: round_to(requests_only_speed, 3),
            average_requests_only_time: round_to(latency, 2),
            unusual_response_time: counters.suspected_rate_limit_count,
            confirmed_rate_limit_count: counters.confirmed_rate_limit_count,
            uids_lost_to_rate_limiting: counters.loss_count,
            uids_lost_to_transport_errors: counters.transport_error_count,
            parse_error_count: counters.parse_error_count,
            total_uids,
            loss_percentage: round_to(loss_percentage, 2),
            benchmark_duration_secs: round_to(timing.duration.as_secs_f64(), 2),
            started_at: timing.started_at,
            finished_at: timing.finished_at,
            samples,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
