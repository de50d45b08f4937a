use super::{types::Config, ConfigError};

/// Largest accepted `retry.backoff_multiplier`.
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Validate configuration.
///
/// Rejects values that would stall a batch (zero concurrency, zero session
/// cap, zero retry attempts) or make the server unreachable.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.server.retained_batches == 0 {
        return Err(ConfigError::ValidationError(
            "server.retained_batches must be at least 1".to_string(),
        ));
    }

    if config.batch.concurrency_limit == 0 {
        return Err(ConfigError::ValidationError(
            "batch.concurrency_limit must be at least 1".to_string(),
        ));
    }

    if config.batch.session_cap == 0 {
        return Err(ConfigError::ValidationError(
            "batch.session_cap must be at least 1".to_string(),
        ));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }

    let multiplier = config.retry.backoff_multiplier;
    if !multiplier.is_finite() || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
        return Err(ConfigError::ValidationError(format!(
            "retry.backoff_multiplier must be between 1.0 and {}, got {}",
            MAX_BACKOFF_MULTIPLIER, multiplier
        )));
    }

    if config.capabilities.endpoint.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "capabilities.endpoint cannot be empty".to_string(),
        ));
    }

    Ok(())
}
