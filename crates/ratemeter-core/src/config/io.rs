use std::path::Path;

use crate::config::model::BenchmarkConfig;
use crate::error::RatemeterError;

/// Read a JSON [`BenchmarkConfig`] from disk. Missing fields take their
/// default values.
pub async fn read_config(path: impl AsRef<Path>) -> Result<BenchmarkConfig, RatemeterError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let config: BenchmarkConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Write a [`BenchmarkConfig`] to disk as pretty-printed JSON.
pub async fn write_config(
    config: &BenchmarkConfig,
    path: impl AsRef<Path>,
) -> Result<(), RatemeterError> {
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path.as_ref(), content).await?;
    Ok(())
}
