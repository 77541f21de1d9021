/// Hosted PostgreSQL storage backend
use crate::{
    error::{ApiError, ApiResult},
    store::models::{
        ActivitySettings, AuthToken, Message, NewMessage, RepositorySettings, DEFAULT_USER,
    },
    store::StoreBackend,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// PostgreSQL-backed store for hosted deployments
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connect to the database and ensure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> ApiResult<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        let backend = Self { pool };
        backend.init_schema().await?;

        info!("PostgreSQL connection established");
        Ok(backend)
    }

    /// Create tables and singleton seed rows. Idempotent.
    async fn init_schema(&self) -> ApiResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                read BOOLEAN NOT NULL DEFAULT FALSE,
                ip_address TEXT,
                user_agent TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_tokens (
                service TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expires_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS repository_settings (
                user_id TEXT PRIMARY KEY,
                hidden_repos TEXT NOT NULL DEFAULT '[]',
                featured_repos TEXT NOT NULL DEFAULT '[]',
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activity_settings (
                user_id TEXT PRIMARY KEY,
                show_discord BOOLEAN NOT NULL DEFAULT TRUE,
                show_spotify BOOLEAN NOT NULL DEFAULT TRUE,
                show_coding BOOLEAN NOT NULL DEFAULT TRUE,
                show_gaming BOOLEAN NOT NULL DEFAULT TRUE,
                show_general BOOLEAN NOT NULL DEFAULT TRUE,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_read ON messages(read)")
            .execute(&self.pool)
            .await?;

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO repository_settings (user_id, updated_at) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(DEFAULT_USER)
        .bind(now)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "INSERT INTO activity_settings (user_id, updated_at) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(DEFAULT_USER)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RepositorySettingsRow {
    user_id: String,
    hidden_repos: String,
    featured_repos: String,
    updated_at: DateTime<Utc>,
}

impl RepositorySettingsRow {
    fn decode(self) -> ApiResult<RepositorySettings> {
        Ok(RepositorySettings {
            user_id: self.user_id,
            hidden_repos: serde_json::from_str(&self.hidden_repos)
                .map_err(|e| ApiError::Storage(format!("Corrupt hidden_repos column: {}", e)))?,
            featured_repos: serde_json::from_str(&self.featured_repos)
                .map_err(|e| ApiError::Storage(format!("Corrupt featured_repos column: {}", e)))?,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl StoreBackend for PostgresBackend {
    async fn create_message(&self, new: NewMessage) -> ApiResult<Message> {
        let now = Utc::now();
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (name, email, subject, body, ip_address, user_agent, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.subject)
        .bind(&new.body)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn list_messages(&self) -> ApiResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn unread_count(&self) -> ApiResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE read = FALSE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: i64) -> ApiResult<()> {
        let result = sqlx::query("UPDATE messages SET read = TRUE, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("No message with id {}", id)));
        }

        Ok(())
    }

    async fn delete_message(&self, id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("No message with id {}", id)));
        }

        Ok(())
    }

    async fn get_token(&self, service: &str) -> ApiResult<AuthToken> {
        sqlx::query_as::<_, AuthToken>("SELECT * FROM auth_tokens WHERE service = $1")
            .bind(service)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No token stored for service {}", service)))
    }

    async fn upsert_token(&self, token: AuthToken) -> ApiResult<AuthToken> {
        let saved = sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO auth_tokens (service, access_token, refresh_token, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (service) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(&token.service)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .bind(token.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn delete_token(&self, service: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE service = $1")
            .bind(service)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn repository_settings(&self) -> ApiResult<RepositorySettings> {
        let row = sqlx::query_as::<_, RepositorySettingsRow>(
            "SELECT * FROM repository_settings WHERE user_id = $1",
        )
        .bind(DEFAULT_USER)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.decode(),
            None => Ok(RepositorySettings::empty(DEFAULT_USER)),
        }
    }

    async fn save_repository_settings(
        &self,
        settings: RepositorySettings,
    ) -> ApiResult<RepositorySettings> {
        sqlx::query(
            r#"
            INSERT INTO repository_settings (user_id, hidden_repos, featured_repos, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                hidden_repos = EXCLUDED.hidden_repos,
                featured_repos = EXCLUDED.featured_repos,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&settings.user_id)
        .bind(serde_json::to_string(&settings.hidden_repos).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&settings.featured_repos).unwrap_or_else(|_| "[]".into()))
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;

        self.repository_settings().await
    }

    async fn activity_settings(&self) -> ApiResult<ActivitySettings> {
        sqlx::query_as::<_, ActivitySettings>(
            "SELECT * FROM activity_settings WHERE user_id = $1",
        )
        .bind(DEFAULT_USER)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Activity settings row missing".to_string()))
    }

    async fn save_activity_settings(
        &self,
        settings: ActivitySettings,
    ) -> ApiResult<ActivitySettings> {
        sqlx::query(
            r#"
            INSERT INTO activity_settings
                (user_id, show_discord, show_spotify, show_coding, show_gaming, show_general, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                show_discord = EXCLUDED.show_discord,
                show_spotify = EXCLUDED.show_spotify,
                show_coding = EXCLUDED.show_coding,
                show_gaming = EXCLUDED.show_gaming,
                show_general = EXCLUDED.show_general,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&settings.user_id)
        .bind(settings.show_discord)
        .bind(settings.show_spotify)
        .bind(settings.show_coding)
        .bind(settings.show_gaming)
        .bind(settings.show_general)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;

        self.activity_settings().await
    }

    async fn ping(&self) -> ApiResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
