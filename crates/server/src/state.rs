use std::sync::Arc;
use marquee_core::{Authenticator, Config, MediaFetcher, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    fetcher: Arc<MediaFetcher>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        fetcher: Arc<MediaFetcher>,
    ) -> Self {
        Self {
            config,
            authenticator,
            fetcher,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn fetcher(&self) -> Arc<MediaFetcher> {
        Arc::clone(&self.fetcher)
    }
}
