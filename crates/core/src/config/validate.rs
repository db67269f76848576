use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker pool has at least one slot
/// - Upload limits are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.ingest.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.max_workers must be at least 1".to_string(),
        ));
    }

    if config.upload.max_file_size == 0 {
        return Err(ConfigError::ValidationError(
            "upload.max_file_size cannot be 0".to_string(),
        ));
    }

    if config.upload.allowed_extension.trim_start_matches('.').is_empty() {
        return Err(ConfigError::ValidationError(
            "upload.allowed_extension cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngestConfig, ServerConfig, UploadConfig};

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                port: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let config = Config {
            ingest: IngestConfig::default().with_max_workers(0),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn test_validate_empty_extension_fails() {
        let config = Config {
            upload: UploadConfig {
                allowed_extension: ".".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
