use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - An API key is present when api_key auth is selected
/// - The fetcher has a tool path, an allow-list and a non-zero poll interval
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().unwrap_or("").is_empty()
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    let fetcher = &config.fetcher;
    if fetcher.tool_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "fetcher.tool_path cannot be empty".to_string(),
        ));
    }
    if fetcher.allowed_hosts.iter().all(|h| h.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "fetcher.allowed_hosts must list at least one host".to_string(),
        ));
    }
    if fetcher.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if fetcher.channel_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.channel_capacity cannot be 0".to_string(),
        ));
    }

    Ok(())
}
