use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ratemeter_core::config::BenchmarkConfig;

#[derive(Parser, Debug)]
#[command(name = "ratemeter-cli")]
#[command(about = "Benchmark how many IDs per second a rate-limited batch endpoint can serve")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a benchmark session
    Run(RunArgs),

    /// Write the default configuration as JSON
    Init {
        /// Destination file
        #[arg(default_value = "ratemeter.json")]
        path: PathBuf,
    },
}

/// Flags for `run`. Every value is optional and overrides the config file.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// URL template; `{ids}` is replaced by the batch, otherwise IDs are appended
    #[arg(long)]
    pub target: Option<String>,

    /// IDs per request
    #[arg(long, short)]
    pub batch_size: Option<u32>,

    /// Concurrent requests per sample
    #[arg(long = "concurrency", short = 'n')]
    pub concurrent_requests: Option<u32>,

    /// Number of samples
    #[arg(long, short)]
    pub samples: Option<u32>,

    /// Minimum seconds between two requests of the same worker
    #[arg(long)]
    pub delay: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Latency multiple above which a response counts as a suspected rate limit
    #[arg(long)]
    pub multiplier: Option<f64>,

    /// JSON field holding the returned records
    #[arg(long)]
    pub data_field: Option<String>,

    /// Directory for the JSON report
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Seconds to wait before the first sample
    #[arg(long)]
    pub start_delay: Option<f64>,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Skip writing the JSON report
    #[arg(long)]
    pub no_report: bool,
}

impl RunArgs {
    /// Layer the command-line overrides on top of `config`.
    pub fn apply(&self, mut config: BenchmarkConfig) -> BenchmarkConfig {
        if let Some(target) = &self.target {
            config.target = target.clone();
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.concurrent_requests {
            config.concurrent_requests = v;
        }
        if let Some(v) = self.samples {
            config.sample_count = v;
        }
        if let Some(v) = self.delay {
            config.rate_limit_delay_secs = v;
        }
        if let Some(v) = self.timeout {
            config.response_timeout_secs = v;
        }
        if let Some(v) = self.multiplier {
            config.threshold_multiplier = v;
        }
        if let Some(field) = &self.data_field {
            config.data_field = field.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(v) = self.start_delay {
            config.start_delay_secs = v;
        }
        if let Some(ua) = &self.user_agent {
            config.user_agent = Some(ua.clone());
        }
        if self.no_report {
            config.generate_report = false;
        }
        config
    }
}
