use crate::config::model::BenchmarkConfig;
use crate::error::RatemeterError;

/// Validate a [`BenchmarkConfig`] and return every problem found.
///
/// An empty `Vec` means the configuration is usable.
pub fn validate_config(cfg: &BenchmarkConfig) -> Vec<RatemeterError> {
    let mut errors = Vec::new();

    let target = cfg.target.trim();
    if target.is_empty() {
        errors.push(RatemeterError::Validation(
            "target URL must not be empty".to_string(),
        ));
    } else if !target.starts_with("http://") && !target.starts_with("https://") {
        errors.push(RatemeterError::Validation(format!(
            "target URL must start with http:// or https:// (got: {})",
            cfg.target
        )));
    }

    for (name, value) in [
        ("batch_size", cfg.batch_size),
        ("concurrent_requests", cfg.concurrent_requests),
        ("sample_count", cfg.sample_count),
    ] {
        if value == 0 {
            errors.push(RatemeterError::Validation(format!(
                "{name} must be at least 1"
            )));
        }
    }

    if !cfg.rate_limit_delay_secs.is_finite() || cfg.rate_limit_delay_secs < 0.0 {
        errors.push(RatemeterError::Validation(format!(
            "rate_limit_delay_secs must be a non-negative number (got: {})",
            cfg.rate_limit_delay_secs
        )));
    }

    if !cfg.start_delay_secs.is_finite() || cfg.start_delay_secs < 0.0 {
        errors.push(RatemeterError::Validation(format!(
            "start_delay_secs must be a non-negative number (got: {})",
            cfg.start_delay_secs
        )));
    }

    if !cfg.response_timeout_secs.is_finite() || cfg.response_timeout_secs <= 0.0 {
        errors.push(RatemeterError::Validation(format!(
            "response_timeout_secs must be greater than 0 (got: {})",
            cfg.response_timeout_secs
        )));
    }

    if !cfg.threshold_multiplier.is_finite() || cfg.threshold_multiplier <= 0.0 {
        errors.push(RatemeterError::Validation(format!(
            "threshold_multiplier must be greater than 0 (got: {})",
            cfg.threshold_multiplier
        )));
    }

    if cfg.data_field.trim().is_empty() {
        errors.push(RatemeterError::Validation(
            "data_field must not be empty".to_string(),
        ));
    }

    errors
}

/// Validate and collapse all problems into a single [`RatemeterError::Config`].
pub fn ensure_valid(cfg: &BenchmarkConfig) -> Result<(), RatemeterError> {
    let errors = validate_config(cfg);
    if errors.is_empty() {
        return Ok(());
    }
    let joined = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(RatemeterError::Config(joined))
}
