use super::{types::Config, ConfigError, TorrentClientBackend};

/// Validate configuration
/// Currently validates:
/// - Both tracker API keys are set
/// - Server port is not 0
/// - The injection URL parses (and carries a password for Deluge)
/// - Input and output directories differ
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (name, tracker) in [("red", &config.red), ("ops", &config.ops)] {
        if tracker.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{}.api_key cannot be empty",
                name
            )));
        }
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if let Some(injection) = &config.injection {
        let url = reqwest::Url::parse(&injection.url).map_err(|e| {
            ConfigError::ValidationError(format!("injection.url is invalid: {}", e))
        })?;

        if injection.client == TorrentClientBackend::Deluge && url.password().is_none() {
            return Err(ConfigError::ValidationError(
                "injection.url must include the Deluge password (e.g. http://:<PASSWORD>@localhost:8112/json)"
                    .to_string(),
            ));
        }
    }

    if config.paths.input_directory.as_ref() == Some(&config.paths.output_directory) {
        return Err(ConfigError::ValidationError(
            "paths.input_directory and paths.output_directory must differ".to_string(),
        ));
    }

    Ok(())
}
