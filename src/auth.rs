/// Authentication extractors and utilities
use crate::{context::AppContext, discord::DiscordUser, error::ApiError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

/// Header carrying the static admin API key
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
/// Header carrying a Discord OAuth access token for identity-based auth
pub const DISCORD_TOKEN_HEADER: &str = "discord-token";

/// Extract a bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// How an admin request proved itself
#[derive(Debug, Clone)]
pub enum AdminIdentity {
    ApiKey,
    Discord(DiscordUser),
}

/// Admin authentication context - accepts either the static API key or a
/// Discord token resolving to the configured admin identity.
///
/// A missing or invalid credential rejects with 401; a valid Discord
/// token belonging to someone else rejects with 403.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub AdminIdentity);

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        if let Some(key) = header_value(&parts.headers, ADMIN_KEY_HEADER) {
            let configured = state
                .config
                .admin
                .api_key
                .as_deref()
                .ok_or_else(|| ApiError::Auth("Admin API key auth is disabled".to_string()))?;

            if key == configured {
                return Ok(AdminAuth(AdminIdentity::ApiKey));
            }
            return Err(ApiError::Auth("Invalid admin API key".to_string()));
        }

        if let Some(token) = header_value(&parts.headers, DISCORD_TOKEN_HEADER) {
            let user = state.discord.verify_admin(&token).await?;
            return Ok(AdminAuth(AdminIdentity::Discord(user)));
        }

        Err(ApiError::Auth("Unauthorized access".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);

        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
