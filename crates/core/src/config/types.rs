use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Command run after a successful fetch so the player picks up the new file
    #[serde(default)]
    pub playlist_hook: Option<PlaylistHookConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared secret, required when `method = "api_key"`
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Where fetched media lands
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_dir")]
    pub directory: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            directory: default_media_dir(),
        }
    }
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("/opt/marquee/media")
}

/// What to do with a running fetch when the HTTP client goes away.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Kill and reap the external tool.
    #[default]
    Kill,
    /// Let the tool run to completion; events are discarded.
    Continue,
}

/// External fetch tool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// Path to the yt-dlp compatible binary
    #[serde(default = "default_tool_path")]
    pub tool_path: PathBuf,
    /// Format selector passed with `-f`
    #[serde(default = "default_format")]
    pub format: String,
    /// Hosts a fetch URL may point at (subdomains included)
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
    /// Additional arguments inserted before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Timeout for the metadata probe in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Timeout for the download itself in seconds (0 = none)
    #[serde(default)]
    pub download_timeout_secs: u64,
    /// Wake-up interval of the supervisor loop in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Buffered events between the supervisor and the HTTP body
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub on_disconnect: DisconnectPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            tool_path: default_tool_path(),
            format: default_format(),
            allowed_hosts: default_allowed_hosts(),
            extra_args: Vec::new(),
            probe_timeout_secs: default_probe_timeout(),
            download_timeout_secs: 0,
            poll_interval_ms: default_poll_interval(),
            channel_capacity: default_channel_capacity(),
            on_disconnect: DisconnectPolicy::default(),
        }
    }
}

fn default_tool_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_format() -> String {
    "best[ext=mp4]/best".to_string()
}

fn default_allowed_hosts() -> Vec<String> {
    ["youtube.com", "youtu.be"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    50
}

fn default_channel_capacity() -> usize {
    64
}

/// Playlist reload hook configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistHookConfig {
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_hook_timeout")]
    pub timeout_secs: u64,
}

fn default_hook_timeout() -> u64 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub fetcher: FetcherConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_hook: Option<PlaylistHookConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            media: config.media.clone(),
            fetcher: config.fetcher.clone(),
            playlist_hook: config.playlist_hook.clone(),
        }
    }
}
