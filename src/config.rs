/// Configuration management for the portfolio backend
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub spotify: SpotifyConfig,
    pub discord: DiscordConfig,
    pub github: GithubConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage backend selection
///
/// Three interchangeable backends share one logical contract; which one is
/// active is purely a configuration concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    Sqlite {
        path: String,
    },
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Supabase {
        url: String,
        service_role_key: String,
    },
}

/// Admin dashboard authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Static API key accepted in the `x-admin-key` header. Unset disables
    /// key-based auth, leaving Discord identity as the only admin path.
    pub api_key: Option<String>,
}

/// Spotify OAuth application credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Token endpoint host, e.g. https://accounts.spotify.com
    pub accounts_url: String,
    /// Web API host, e.g. https://api.spotify.com
    pub api_url: String,
}

/// Discord OAuth credentials and presence relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    /// The single Discord user id allowed into the admin dashboard
    pub authorized_user_id: String,
    /// The user whose public presence the portfolio displays
    pub presence_user_id: String,
    /// Discord HTTP API host, e.g. https://discord.com/api
    pub api_url: String,
    /// Public presence relay host, e.g. https://api.lanyard.rest
    pub relay_url: String,
}

/// GitHub aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub username: String,
    pub api_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PORTFOLIO_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORTFOLIO_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map_err(|_| ApiError::Config("Invalid port number".to_string()))?;
        let version = env::var("PORTFOLIO_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let storage = Self::storage_from_env()?;

        let admin = AdminConfig {
            api_key: env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        let spotify = SpotifyConfig {
            client_id: env::var("SPOTIFY_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("SPOTIFY_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: env::var("SPOTIFY_REDIRECT_URI")
                .unwrap_or_else(|_| format!("http://{}:{}/api/spotify/token", hostname, port)),
            accounts_url: env::var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
            api_url: env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com".to_string()),
        };

        let discord = DiscordConfig {
            client_id: env::var("DISCORD_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("DISCORD_CLIENT_SECRET").unwrap_or_default(),
            authorized_user_id: env::var("DISCORD_AUTHORIZED_USER_ID").unwrap_or_default(),
            presence_user_id: env::var("DISCORD_PRESENCE_USER_ID")
                .or_else(|_| env::var("DISCORD_AUTHORIZED_USER_ID"))
                .unwrap_or_default(),
            api_url: env::var("DISCORD_API_URL")
                .unwrap_or_else(|_| "https://discord.com/api".to_string()),
            relay_url: env::var("PRESENCE_RELAY_URL")
                .unwrap_or_else(|_| "https://api.lanyard.rest".to_string()),
        };

        let github = GithubConfig {
            username: env::var("GITHUB_USERNAME").unwrap_or_default(),
            api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage,
            admin,
            spotify,
            discord,
            github,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Pick the storage backend from the environment.
    ///
    /// `PORTFOLIO_DB_BACKEND` selects explicitly; otherwise the presence of
    /// `SUPABASE_URL` or `DATABASE_URL` picks the hosted backends, with the
    /// embedded SQLite file as the final default.
    fn storage_from_env() -> ApiResult<StorageConfig> {
        let backend = env::var("PORTFOLIO_DB_BACKEND").unwrap_or_default();

        match backend.as_str() {
            "sqlite" => Ok(StorageConfig::Sqlite {
                path: sqlite_path_from_env(),
            }),
            "postgres" => Ok(StorageConfig::Postgres {
                database_url: env::var("DATABASE_URL").map_err(|_| {
                    ApiError::Config("DATABASE_URL required for postgres backend".to_string())
                })?,
                max_connections: postgres_max_connections(),
            }),
            "supabase" => Ok(StorageConfig::Supabase {
                url: env::var("SUPABASE_URL").map_err(|_| {
                    ApiError::Config("SUPABASE_URL required for supabase backend".to_string())
                })?,
                service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY").map_err(|_| {
                    ApiError::Config(
                        "SUPABASE_SERVICE_ROLE_KEY required for supabase backend".to_string(),
                    )
                })?,
            }),
            "" => {
                if let (Ok(url), Ok(key)) = (
                    env::var("SUPABASE_URL"),
                    env::var("SUPABASE_SERVICE_ROLE_KEY"),
                ) {
                    Ok(StorageConfig::Supabase {
                        url,
                        service_role_key: key,
                    })
                } else if let Ok(database_url) = env::var("DATABASE_URL") {
                    Ok(StorageConfig::Postgres {
                        database_url,
                        max_connections: postgres_max_connections(),
                    })
                } else {
                    Ok(StorageConfig::Sqlite {
                        path: sqlite_path_from_env(),
                    })
                }
            }
            other => Err(ApiError::Config(format!(
                "Unknown storage backend: {}",
                other
            ))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Config("Hostname cannot be empty".to_string()));
        }

        if self.admin.api_key.is_none() && self.discord.authorized_user_id.is_empty() {
            return Err(ApiError::Config(
                "Either ADMIN_API_KEY or DISCORD_AUTHORIZED_USER_ID must be set".to_string(),
            ));
        }

        Ok(())
    }
}

fn sqlite_path_from_env() -> String {
    env::var("PORTFOLIO_SQLITE_PATH").unwrap_or_else(|_| "./data/portfolio.db".to_string())
}

fn postgres_max_connections() -> u32 {
    env::var("POSTGRES_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}
