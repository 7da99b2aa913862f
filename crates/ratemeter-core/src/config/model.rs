use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the comma-separated batch IDs in a target URL.
pub const IDS_PLACEHOLDER: &str = "{ids}";

/// Static configuration for one benchmark session.
///
/// Loaded once at startup and never re-read while a session is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BenchmarkConfig {
    /// URL template. Either contains [`IDS_PLACEHOLDER`] or ends where the
    /// ID list should be appended.
    pub target: String,
    /// IDs covered by a single request.
    pub batch_size: u32,
    /// Requests in flight per sample.
    pub concurrent_requests: u32,
    /// Number of sequential samples in the session.
    pub sample_count: u32,
    /// Minimum spacing between two requests issued by the same worker.
    pub rate_limit_delay_secs: f64,
    /// Whether a JSON report is written at the end of the session.
    pub generate_report: bool,
    /// Directory the JSON report is written to. Created if absent.
    pub output_dir: PathBuf,
    /// Hard ceiling on a single request round-trip.
    pub response_timeout_secs: f64,
    /// A latency above `average * threshold_multiplier` is a suspected
    /// rate limit.
    pub threshold_multiplier: f64,
    /// Name of the JSON list field extracted from each response body.
    pub data_field: String,
    /// Pause before the first sample is issued.
    pub start_delay_secs: f64,
    /// Overrides the transport's default `User-Agent` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            target: "https://games.roblox.com/v1/games?universeIds=".to_string(),
            batch_size: 100,
            concurrent_requests: 100,
            sample_count: 10,
            rate_limit_delay_secs: 3.0,
            generate_report: true,
            output_dir: PathBuf::from("benchmark-results"),
            response_timeout_secs: 20.0,
            threshold_multiplier: 2.0,
            data_field: "data".to_string(),
            start_delay_secs: 2.0,
            user_agent: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay_secs.max(0.0))
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.response_timeout_secs.max(0.0))
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs_f64(self.start_delay_secs.max(0.0))
    }

    /// IDs requested in one sample (`batch_size * concurrent_requests`).
    pub fn ids_per_sample(&self) -> u64 {
        self.batch_size as u64 * self.concurrent_requests as u64
    }

    /// IDs requested over the whole session.
    pub fn total_ids(&self) -> u64 {
        self.ids_per_sample() * self.sample_count as u64
    }
}
