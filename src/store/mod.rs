/// Storage layer
///
/// One logical contract over three interchangeable backends: embedded
/// SQLite, hosted PostgreSQL, and a hosted backend-as-a-service spoken to
/// over HTTP. Callers never learn which backend is active.
pub mod models;
pub mod postgres;
pub mod sqlite;
pub mod supabase;

use crate::{
    config::StorageConfig,
    error::{ApiError, ApiResult},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use models::{
    ActivitySettings, ActivitySettingsPatch, AuthToken, Message, NewMessage, RepositorySettings,
    RepositorySettingsPatch, TokenUpsert,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Operations every storage backend provides
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn create_message(&self, new: NewMessage) -> ApiResult<Message>;
    async fn list_messages(&self) -> ApiResult<Vec<Message>>;
    async fn unread_count(&self) -> ApiResult<i64>;
    async fn mark_read(&self, id: i64) -> ApiResult<()>;
    async fn delete_message(&self, id: i64) -> ApiResult<()>;

    async fn get_token(&self, service: &str) -> ApiResult<AuthToken>;
    async fn upsert_token(&self, token: AuthToken) -> ApiResult<AuthToken>;
    async fn delete_token(&self, service: &str) -> ApiResult<()>;

    async fn repository_settings(&self) -> ApiResult<RepositorySettings>;
    async fn save_repository_settings(
        &self,
        settings: RepositorySettings,
    ) -> ApiResult<RepositorySettings>;
    async fn activity_settings(&self) -> ApiResult<ActivitySettings>;
    async fn save_activity_settings(
        &self,
        settings: ActivitySettings,
    ) -> ApiResult<ActivitySettings>;

    async fn ping(&self) -> ApiResult<()>;
}

/// Handle to the active storage backend
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StoreBackend>,
}

/// Process-wide store, initialized at most once. Requests racing on first
/// use all wait on the same initialization instead of opening competing
/// pools.
static STORE: OnceCell<Store> = OnceCell::const_new();

/// Get the process-wide store, connecting on first use.
///
/// Tests should not go through this; they build a [`Store`] around their
/// own backend with [`Store::new`] so each test owns (and drops) its pool.
pub async fn global(config: &StorageConfig) -> ApiResult<Store> {
    STORE
        .get_or_try_init(|| Store::connect(config))
        .await
        .cloned()
}

impl Store {
    /// Wrap an already-constructed backend
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Connect the backend the configuration selects
    pub async fn connect(config: &StorageConfig) -> ApiResult<Self> {
        let backend: Arc<dyn StoreBackend> = match config {
            StorageConfig::Sqlite { path } => {
                info!("Using SQLite storage at {}", path);
                Arc::new(sqlite::SqliteBackend::connect(path).await?)
            }
            StorageConfig::Postgres {
                database_url,
                max_connections,
            } => {
                info!("Using PostgreSQL storage");
                Arc::new(postgres::PostgresBackend::connect(database_url, *max_connections).await?)
            }
            StorageConfig::Supabase {
                url,
                service_role_key,
            } => {
                info!("Using Supabase storage at {}", url);
                Arc::new(supabase::SupabaseBackend::new(url, service_role_key)?)
            }
        };

        Ok(Self::new(backend))
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub async fn create_message(&self, new: NewMessage) -> ApiResult<Message> {
        self.backend.create_message(new).await
    }

    pub async fn list_messages(&self) -> ApiResult<Vec<Message>> {
        self.backend.list_messages().await
    }

    pub async fn unread_count(&self) -> ApiResult<i64> {
        self.backend.unread_count().await
    }

    /// Idempotent: marking an already-read message succeeds again.
    pub async fn mark_read(&self, id: i64) -> ApiResult<()> {
        self.backend.mark_read(id).await
    }

    pub async fn delete_message(&self, id: i64) -> ApiResult<()> {
        self.backend.delete_message(id).await
    }

    // ------------------------------------------------------------------
    // OAuth tokens
    // ------------------------------------------------------------------

    /// NotFound means "service not connected", which callers handle as a
    /// normal state rather than a failure.
    pub async fn get_token(&self, service: &str) -> ApiResult<AuthToken> {
        self.backend.get_token(service).await
    }

    /// Upsert token material from an exchange or refresh.
    ///
    /// Computes the absolute expiry from `expires_in` and keeps the
    /// previously stored refresh token when the provider did not rotate it.
    pub async fn save_token(&self, service: &str, upsert: TokenUpsert) -> ApiResult<AuthToken> {
        let refresh_token = match upsert.refresh_token {
            Some(token) => Some(token),
            None => match self.backend.get_token(service).await {
                Ok(existing) => existing.refresh_token,
                Err(ApiError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
        };

        let now = Utc::now();
        let token = AuthToken {
            service: service.to_string(),
            access_token: upsert.access_token,
            refresh_token,
            expires_at: upsert.expires_in.map(|secs| now + Duration::seconds(secs)),
            updated_at: now,
        };

        self.backend.upsert_token(token).await
    }

    /// Idempotent: deleting an absent token is a success.
    pub async fn delete_token(&self, service: &str) -> ApiResult<()> {
        self.backend.delete_token(service).await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub async fn repository_settings(&self) -> ApiResult<RepositorySettings> {
        self.backend.repository_settings().await
    }

    /// Merge the patch over the current row; absent fields are untouched.
    pub async fn update_repository_settings(
        &self,
        patch: RepositorySettingsPatch,
    ) -> ApiResult<RepositorySettings> {
        let mut settings = self.backend.repository_settings().await?;

        if let Some(hidden) = patch.hidden_repos {
            settings.hidden_repos = hidden;
        }
        if let Some(featured) = patch.featured_repos {
            settings.featured_repos = featured;
        }
        settings.updated_at = Utc::now();

        self.backend.save_repository_settings(settings).await
    }

    pub async fn activity_settings(&self) -> ApiResult<ActivitySettings> {
        self.backend.activity_settings().await
    }

    pub async fn update_activity_settings(
        &self,
        patch: ActivitySettingsPatch,
    ) -> ApiResult<ActivitySettings> {
        let mut settings = self.backend.activity_settings().await?;

        if let Some(v) = patch.show_discord {
            settings.show_discord = v;
        }
        if let Some(v) = patch.show_spotify {
            settings.show_spotify = v;
        }
        if let Some(v) = patch.show_coding {
            settings.show_coding = v;
        }
        if let Some(v) = patch.show_gaming {
            settings.show_gaming = v;
        }
        if let Some(v) = patch.show_general {
            settings.show_general = v;
        }
        settings.updated_at = Utc::now();

        self.backend.save_activity_settings(settings).await
    }

    /// Cheap connectivity probe for the admin status endpoint
    pub async fn ping(&self) -> ApiResult<()> {
        self.backend.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::DEFAULT_USER;

    async fn test_store() -> Store {
        let backend = sqlite::SqliteBackend::connect(":memory:").await.unwrap();
        Store::new(Arc::new(backend))
    }

    fn sample_message() -> NewMessage {
        NewMessage {
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: Some("test-agent".to_string()),
        }
    }

    #[tokio::test]
    async fn test_message_lifecycle() {
        let store = test_store().await;

        let created = store.create_message(sample_message()).await.unwrap();
        assert!(!created.read);
        assert_eq!(created.name, "A");
        assert_eq!(created.body, "hello");

        let listed = store.list_messages().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(store.unread_count().await.unwrap(), 1);

        store.mark_read(created.id).await.unwrap();
        // Idempotent second call
        store.mark_read(created.id).await.unwrap();
        assert_eq!(store.unread_count().await.unwrap(), 0);
        assert!(store.list_messages().await.unwrap()[0].read);

        store.delete_message(created.id).await.unwrap();
        assert!(store.list_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identical_submissions_create_independent_rows() {
        let store = test_store().await;

        let first = store.create_message(sample_message()).await.unwrap();
        let second = store.create_message(sample_message()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.list_messages().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_message_operations_return_not_found() {
        let store = test_store().await;

        assert!(matches!(
            store.mark_read(999).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_message(999).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_leaves_other_rows_untouched() {
        let store = test_store().await;

        let keep = store.create_message(sample_message()).await.unwrap();
        let gone = store.create_message(sample_message()).await.unwrap();

        store.delete_message(gone.id).await.unwrap();

        let remaining = store.list_messages().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_token_upsert_and_expiry() {
        let store = test_store().await;

        assert!(matches!(
            store.get_token("spotify").await,
            Err(ApiError::NotFound(_))
        ));

        let saved = store
            .save_token(
                "spotify",
                TokenUpsert {
                    access_token: "access-1".to_string(),
                    refresh_token: Some("refresh-1".to_string()),
                    expires_in: Some(3600),
                },
            )
            .await
            .unwrap();

        assert_eq!(saved.access_token, "access-1");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
        let expires_at = saved.expires_at.expect("expiry should be recorded");
        assert!(expires_at > Utc::now() + Duration::seconds(3500));
        assert!(!saved.is_expired(Utc::now()));
        assert!(saved.is_expired(Utc::now() + Duration::seconds(3700)));
    }

    #[tokio::test]
    async fn test_refresh_token_preserved_when_not_rotated() {
        let store = test_store().await;

        store
            .save_token(
                "spotify",
                TokenUpsert {
                    access_token: "access-1".to_string(),
                    refresh_token: Some("refresh-1".to_string()),
                    expires_in: Some(3600),
                },
            )
            .await
            .unwrap();

        // A refresh response without a rotated refresh token
        let refreshed = store
            .save_token(
                "spotify",
                TokenUpsert {
                    access_token: "access-2".to_string(),
                    refresh_token: None,
                    expires_in: Some(3600),
                },
            )
            .await
            .unwrap();

        assert_eq!(refreshed.access_token, "access-2");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_delete_token_is_idempotent() {
        let store = test_store().await;

        store.delete_token("spotify").await.unwrap();

        store
            .save_token(
                "spotify",
                TokenUpsert {
                    access_token: "access".to_string(),
                    refresh_token: None,
                    expires_in: None,
                },
            )
            .await
            .unwrap();

        store.delete_token("spotify").await.unwrap();
        store.delete_token("spotify").await.unwrap();
        assert!(matches!(
            store.get_token("spotify").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_settings_partial_update() {
        let store = test_store().await;

        let initial = store.repository_settings().await.unwrap();
        assert_eq!(initial.user_id, DEFAULT_USER);
        assert!(initial.hidden_repos.is_empty());
        assert!(initial.featured_repos.is_empty());

        let updated = store
            .update_repository_settings(RepositorySettingsPatch {
                hidden_repos: Some(vec!["old-experiment".to_string()]),
                featured_repos: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.hidden_repos, vec!["old-experiment".to_string()]);
        assert!(updated.featured_repos.is_empty());

        // Patching the other field leaves the first alone
        let updated = store
            .update_repository_settings(RepositorySettingsPatch {
                hidden_repos: None,
                featured_repos: Some(vec!["portfolio".to_string()]),
            })
            .await
            .unwrap();
        assert_eq!(updated.hidden_repos, vec!["old-experiment".to_string()]);
        assert_eq!(updated.featured_repos, vec!["portfolio".to_string()]);
    }

    #[tokio::test]
    async fn test_activity_settings_defaults_and_update() {
        let store = test_store().await;

        let initial = store.activity_settings().await.unwrap();
        assert!(initial.show_discord);
        assert!(initial.show_spotify);
        assert!(initial.show_coding);
        assert!(initial.show_gaming);
        assert!(initial.show_general);

        let updated = store
            .update_activity_settings(ActivitySettingsPatch {
                show_gaming: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!updated.show_gaming);
        assert!(updated.show_discord);
    }
}
