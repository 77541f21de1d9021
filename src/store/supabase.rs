/// Hosted backend-as-a-service storage backend
///
/// Talks to a Supabase project over its PostgREST-style HTTP API using the
/// service-role key. The hosted schema mirrors the SQL backends, with the
/// settings list columns stored as native JSON arrays.
use crate::{
    error::{ApiError, ApiResult},
    store::models::{
        ActivitySettings, AuthToken, Message, NewMessage, RepositorySettings, DEFAULT_USER,
    },
    store::StoreBackend,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;

/// PostgREST `Prefer` values for mutations
const RETURN_ROWS: &str = "return=representation";
const UPSERT_ROWS: &str = "resolution=merge-duplicates,return=representation";

#[derive(Clone)]
pub struct SupabaseBackend {
    http: reqwest::Client,
    rest_url: String,
}

impl SupabaseBackend {
    pub fn new(url: &str, service_role_key: &str) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(service_role_key)
            .map_err(|_| ApiError::Config("Invalid Supabase service role key".to_string()))?;
        headers.insert("apikey", key_value);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", service_role_key))
            .map_err(|_| ApiError::Config("Invalid Supabase service role key".to_string()))?;
        headers.insert("authorization", bearer);

        let http = reqwest::Client::builder()
            .user_agent("portfolio-hub/0.1")
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    /// Issue a request and decode the rows it returns.
    async fn rows<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ApiResult<Vec<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("Supabase request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Storage(format!("Supabase returned {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Storage(format!("Invalid Supabase response: {}", e)))
    }
}

#[async_trait]
impl StoreBackend for SupabaseBackend {
    async fn create_message(&self, new: NewMessage) -> ApiResult<Message> {
        let now = Utc::now();
        let rows: Vec<Message> = self
            .rows(
                self.http
                    .post(self.table_url("messages"))
                    .header("prefer", RETURN_ROWS)
                    .json(&json!({
                        "name": new.name,
                        "email": new.email,
                        "subject": new.subject,
                        "body": new.body,
                        "read": false,
                        "ip_address": new.ip_address,
                        "user_agent": new.user_agent,
                        "created_at": now,
                        "updated_at": now,
                    })),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::Storage("Insert returned no row".to_string()))
    }

    async fn list_messages(&self) -> ApiResult<Vec<Message>> {
        self.rows(
            self.http
                .get(self.table_url("messages"))
                .query(&[("select", "*"), ("order", "created_at.desc")]),
        )
        .await
    }

    async fn unread_count(&self) -> ApiResult<i64> {
        #[derive(serde::Deserialize)]
        struct IdRow {
            #[allow(dead_code)]
            id: i64,
        }

        let rows: Vec<IdRow> = self
            .rows(
                self.http
                    .get(self.table_url("messages"))
                    .query(&[("select", "id"), ("read", "eq.false")]),
            )
            .await?;

        Ok(rows.len() as i64)
    }

    async fn mark_read(&self, id: i64) -> ApiResult<()> {
        let rows: Vec<Message> = self
            .rows(
                self.http
                    .patch(self.table_url("messages"))
                    .query(&[("id", format!("eq.{}", id))])
                    .header("prefer", RETURN_ROWS)
                    .json(&json!({ "read": true, "updated_at": Utc::now() })),
            )
            .await?;

        if rows.is_empty() {
            return Err(ApiError::NotFound(format!("No message with id {}", id)));
        }

        Ok(())
    }

    async fn delete_message(&self, id: i64) -> ApiResult<()> {
        let rows: Vec<Message> = self
            .rows(
                self.http
                    .delete(self.table_url("messages"))
                    .query(&[("id", format!("eq.{}", id))])
                    .header("prefer", RETURN_ROWS),
            )
            .await?;

        if rows.is_empty() {
            return Err(ApiError::NotFound(format!("No message with id {}", id)));
        }

        Ok(())
    }

    async fn get_token(&self, service: &str) -> ApiResult<AuthToken> {
        let rows: Vec<AuthToken> = self
            .rows(self.http.get(self.table_url("auth_tokens")).query(&[
                ("select", "*".to_string()),
                ("service", format!("eq.{}", service)),
            ]))
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("No token stored for service {}", service)))
    }

    async fn upsert_token(&self, token: AuthToken) -> ApiResult<AuthToken> {
        let rows: Vec<AuthToken> = self
            .rows(
                self.http
                    .post(self.table_url("auth_tokens"))
                    .query(&[("on_conflict", "service")])
                    .header("prefer", UPSERT_ROWS)
                    .json(&token),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::Storage("Upsert returned no row".to_string()))
    }

    async fn delete_token(&self, service: &str) -> ApiResult<()> {
        let _rows: Vec<AuthToken> = self
            .rows(
                self.http
                    .delete(self.table_url("auth_tokens"))
                    .query(&[("service", format!("eq.{}", service))])
                    .header("prefer", RETURN_ROWS),
            )
            .await?;
        Ok(())
    }

    async fn repository_settings(&self) -> ApiResult<RepositorySettings> {
        let rows: Vec<RepositorySettings> = self
            .rows(self.http.get(self.table_url("repository_settings")).query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", DEFAULT_USER)),
            ]))
            .await?;

        Ok(rows
            .into_iter()
            .next()
            .unwrap_or_else(|| RepositorySettings::empty(DEFAULT_USER)))
    }

    async fn save_repository_settings(
        &self,
        settings: RepositorySettings,
    ) -> ApiResult<RepositorySettings> {
        let rows: Vec<RepositorySettings> = self
            .rows(
                self.http
                    .post(self.table_url("repository_settings"))
                    .query(&[("on_conflict", "user_id")])
                    .header("prefer", UPSERT_ROWS)
                    .json(&settings),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::Storage("Upsert returned no row".to_string()))
    }

    async fn activity_settings(&self) -> ApiResult<ActivitySettings> {
        let rows: Vec<ActivitySettings> = self
            .rows(self.http.get(self.table_url("activity_settings")).query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", DEFAULT_USER)),
            ]))
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound("Activity settings row missing".to_string()))
    }

    async fn save_activity_settings(
        &self,
        settings: ActivitySettings,
    ) -> ApiResult<ActivitySettings> {
        let rows: Vec<ActivitySettings> = self
            .rows(
                self.http
                    .post(self.table_url("activity_settings"))
                    .query(&[("on_conflict", "user_id")])
                    .header("prefer", UPSERT_ROWS)
                    .json(&settings),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::Storage("Upsert returned no row".to_string()))
    }

    async fn ping(&self) -> ApiResult<()> {
        let response = self
            .http
            .get(self.table_url("messages"))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("Supabase request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Storage(format!(
                "Supabase returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
