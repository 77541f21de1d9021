/// Embedded SQLite storage backend
use crate::{
    error::{ApiError, ApiResult},
    store::models::{
        ActivitySettings, AuthToken, Message, NewMessage, RepositorySettings, DEFAULT_USER,
    },
    store::StoreBackend,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// SQLite-backed store, the default for single-box deployments
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and ensure the schema exists.
    /// `":memory:"` opens a transient in-process database for tests.
    pub async fn connect(path: &str) -> ApiResult<Self> {
        let in_memory = path == ":memory:";

        if !in_memory {
            if let Some(parent) = Path::new(path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ApiError::Internal(format!("Failed to create data dir: {}", e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        // An in-memory database exists per connection, so the pool must
        // never hand out a second one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 10 })
            .connect_with(options)
            .await?;

        let backend = Self { pool };
        backend.init_schema().await?;

        Ok(backend)
    }

    /// Create tables, indexes, and singleton seed rows. Idempotent.
    async fn init_schema(&self) -> ApiResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                ip_address TEXT,
                user_agent TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
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
                expires_at TEXT,
                updated_at TEXT NOT NULL
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
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activity_settings (
                user_id TEXT PRIMARY KEY,
                show_discord INTEGER NOT NULL DEFAULT 1,
                show_spotify INTEGER NOT NULL DEFAULT 1,
                show_coding INTEGER NOT NULL DEFAULT 1,
                show_gaming INTEGER NOT NULL DEFAULT 1,
                show_general INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at DESC)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_read ON messages(read)")
            .execute(&self.pool)
            .await?;

        let now = Utc::now();
        sqlx::query(
            "INSERT OR IGNORE INTO repository_settings (user_id, updated_at) VALUES (?, ?)",
        )
        .bind(DEFAULT_USER)
        .bind(now)
        .execute(&self.pool)
        .await?;
        sqlx::query("INSERT OR IGNORE INTO activity_settings (user_id, updated_at) VALUES (?, ?)")
            .bind(DEFAULT_USER)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Settings row before the JSON columns are decoded
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
impl StoreBackend for SqliteBackend {
    async fn create_message(&self, new: NewMessage) -> ApiResult<Message> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO messages (name, email, subject, body, ip_address, user_agent, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
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

        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(message)
    }

    async fn list_messages(&self) -> ApiResult<Vec<Message>> {
        let messages =
            sqlx::query_as::<_, Message>("SELECT * FROM messages ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(messages)
    }

    async fn unread_count(&self) -> ApiResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE read = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: i64) -> ApiResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(ApiError::NotFound(format!("No message with id {}", id)));
        }

        sqlx::query("UPDATE messages SET read = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_message(&self, id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("No message with id {}", id)));
        }

        Ok(())
    }

    async fn get_token(&self, service: &str) -> ApiResult<AuthToken> {
        sqlx::query_as::<_, AuthToken>("SELECT * FROM auth_tokens WHERE service = ?")
            .bind(service)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No token stored for service {}", service)))
    }

    async fn upsert_token(&self, token: AuthToken) -> ApiResult<AuthToken> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (service, access_token, refresh_token, expires_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(service) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&token.service)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await?;

        self.get_token(&token.service).await
    }

    async fn delete_token(&self, service: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE service = ?")
            .bind(service)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn repository_settings(&self) -> ApiResult<RepositorySettings> {
        let row = sqlx::query_as::<_, RepositorySettingsRow>(
            "SELECT * FROM repository_settings WHERE user_id = ?",
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
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                hidden_repos = excluded.hidden_repos,
                featured_repos = excluded.featured_repos,
                updated_at = excluded.updated_at
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
            "SELECT * FROM activity_settings WHERE user_id = ?",
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
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                show_discord = excluded.show_discord,
                show_spotify = excluded.show_spotify,
                show_coding = excluded.show_coding,
                show_gaming = excluded.show_gaming,
                show_general = excluded.show_general,
                updated_at = excluded.updated_at
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
