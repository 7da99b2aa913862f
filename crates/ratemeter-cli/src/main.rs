mod args;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use ratemeter_core::config::{read_config, write_config, BenchmarkConfig};
use ratemeter_core::results::render_summary;
use ratemeter_core::BenchmarkSession;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::args::{Cli, Command, RunArgs};
use crate::progress::ProgressRenderer;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries progress bars and the summary.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Init { path } => {
            write_config(&BenchmarkConfig::default(), &path)
                .await
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let base = match &args.config {
        Some(path) => read_config(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => BenchmarkConfig::default(),
    };
    let config = args.apply(base);

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current sample");
            ctrl_c.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let session = BenchmarkSession::with_http_transport(config)
        .context("Invalid benchmark configuration")?
        .with_events(tx)
        .with_cancellation(token);
    if session.config().generate_report {
        info!(
            "Reports will be written to {}",
            session.config().output_dir.display()
        );
    }
    let renderer = tokio::spawn(ProgressRenderer::new(false).drain(rx));

    let result = session.run().await;
    // The session owned the only sender, so the renderer ends here.
    if let Err(e) = renderer.await {
        warn!("Progress renderer failed: {e}");
    }

    let outcome = result.context("Benchmark failed")?;

    println!();
    print!("{}", render_summary(&outcome.report));
    if let Some(path) = &outcome.report_path {
        println!("Saved results to {}", path.display());
    }
    if let Some(e) = outcome.report_error {
        return Err(e).context("Failed to write benchmark report");
    }
    Ok(())
}
