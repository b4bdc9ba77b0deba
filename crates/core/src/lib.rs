pub mod auth;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod testing;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DisconnectPolicy, FetcherConfig, MediaConfig, PlaylistHookConfig, SanitizedConfig,
    ServerConfig,
};
pub use fetch::{
    EventEmitter, FetchError, FetchRequest, MediaFetcher, ProgressEvent, VideoInfo, VideoMetadata,
};
