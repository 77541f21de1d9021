/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    discord::DiscordClient,
    error::ApiResult,
    github::GithubClient,
    spotify::SpotifyClient,
    store::{self, Store},
};
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub store: Store,
    pub spotify: Arc<SpotifyClient>,
    pub discord: Arc<DiscordClient>,
    pub github: Arc<GithubClient>,
}

impl AppContext {
    /// Create the context from configuration, connecting the process-wide
    /// store on first use.
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let store = store::global(&config.storage).await?;

        Self::assemble(config, store)
    }

    /// Build a context around a caller-owned store. Tests use this to get
    /// an isolated in-memory database instead of the process-wide pool.
    pub fn with_store(config: ServerConfig, store: Store) -> ApiResult<Self> {
        Self::assemble(config, store)
    }

    fn assemble(config: ServerConfig, store: Store) -> ApiResult<Self> {
        let spotify = Arc::new(SpotifyClient::new(config.spotify.clone(), store.clone())?);
        let discord = Arc::new(DiscordClient::new(config.discord.clone())?);
        let github = Arc::new(GithubClient::new(config.github.clone())?);

        Ok(Self {
            config: Arc::new(config),
            store,
            spotify,
            discord,
            github,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
