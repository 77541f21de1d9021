/// Storage models shared by every backend
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Contact-form submission
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    pub read: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a visitor submits the contact form
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One OAuth token record per external service
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuthToken {
    pub service: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl AuthToken {
    /// Whether the stored access token is past its absolute expiry.
    /// Tokens with no recorded expiry are treated as still valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Incoming token material from an exchange or refresh
#[derive(Debug, Clone)]
pub struct TokenUpsert {
    pub access_token: String,
    /// A provider that does not rotate refresh tokens omits this; the
    /// previously stored refresh token is then preserved.
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Which public repositories are hidden or promoted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    pub user_id: String,
    pub hidden_repos: Vec<String>,
    pub featured_repos: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl RepositorySettings {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            hidden_repos: Vec::new(),
            featured_repos: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Partial update for repository settings; absent fields are untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositorySettingsPatch {
    pub hidden_repos: Option<Vec<String>>,
    pub featured_repos: Option<Vec<String>>,
}

/// Which presence categories the public site renders
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivitySettings {
    pub user_id: String,
    pub show_discord: bool,
    pub show_spotify: bool,
    pub show_coding: bool,
    pub show_gaming: bool,
    pub show_general: bool,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for activity settings; absent fields are untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivitySettingsPatch {
    pub show_discord: Option<bool>,
    pub show_spotify: Option<bool>,
    pub show_coding: Option<bool>,
    pub show_gaming: Option<bool>,
    pub show_general: Option<bool>,
}

/// The single supported tenant
pub const DEFAULT_USER: &str = "default";
