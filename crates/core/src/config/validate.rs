use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0 and stream chunks are non-empty
/// - Extraction timeouts are non-zero
/// - Heartbeat grace period is longer than the watchdog interval
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.server.stream_chunk_size == 0 {
        return Err(ConfigError::ValidationError(
            "server.stream_chunk_size cannot be 0".to_string(),
        ));
    }

    if config.cache.catalog_file.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.catalog_file cannot be empty".to_string(),
        ));
    }

    if config.extractor.attempt_timeout_secs == 0 || config.extractor.http_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "extractor timeouts must be greater than 0".to_string(),
        ));
    }

    let liveness = &config.liveness;
    if liveness.check_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "liveness.check_interval_secs cannot be 0".to_string(),
        ));
    }
    if liveness.grace_period_secs <= liveness.check_interval_secs {
        return Err(ConfigError::ValidationError(format!(
            "liveness.grace_period_secs ({}) must exceed liveness.check_interval_secs ({})",
            liveness.grace_period_secs, liveness.check_interval_secs
        )));
    }

    Ok(())
}
