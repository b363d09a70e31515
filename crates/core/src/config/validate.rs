use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Schema version is at least 1
/// - Staleness threshold is not negative
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.database.schema_version == 0 {
        return Err(ConfigError::ValidationError(
            "database.schema_version must be at least 1".to_string(),
        ));
    }

    if config.refresh.stale_after_days < 0 {
        return Err(ConfigError::ValidationError(
            "refresh.stale_after_days cannot be negative".to_string(),
        ));
    }

    Ok(())
}
