use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys use a double underscore, e.g. `MARQUEE_FETCHER__TOOL_PATH`.
/// `MARQUEE_CONFIG` names the file itself and is not a config key.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("MARQUEE_").ignore(&["config"]).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisconnectPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[auth]
method = "none"

[server]
port = 9000

[fetcher]
allowed_hosts = ["youtube.com"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.fetcher.allowed_hosts.len(), 1);
    }

    #[test]
    fn test_load_config_from_str_missing_auth() {
        let toml = r#"
[server]
port = 8080
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 3000

[media]
directory = "/tmp/marquee-media"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(
            config.media.directory,
            std::path::PathBuf::from("/tmp/marquee-media")
        );
    }

    #[test]
    fn test_load_full_fetcher_and_hook_sections() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "secret"

[fetcher]
tool_path = "/usr/local/bin/yt-dlp"
format = "bestvideo[height<=1080]+bestaudio/best"
extra_args = ["--no-mtime"]
download_timeout_secs = 3600
on_disconnect = "continue"

[playlist_hook]
command = "/opt/scripts/update-playlist.sh"
args = ["--reload"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.fetcher.download_timeout_secs, 3600);
        assert_eq!(config.fetcher.on_disconnect, DisconnectPolicy::Continue);
        assert_eq!(config.fetcher.extra_args, vec!["--no-mtime".to_string()]);
        // Unset keys keep their defaults
        assert_eq!(config.fetcher.poll_interval_ms, 50);

        let hook = config.playlist_hook.unwrap();
        assert_eq!(hook.args, vec!["--reload".to_string()]);
        assert_eq!(hook.timeout_secs, 30);
    }

    #[test]
    fn test_unknown_disconnect_policy_rejected() {
        let toml = r#"
[auth]
method = "none"

[fetcher]
on_disconnect = "pause"
"#;
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::ParseError(_))
        ));
    }
}
