/// Discord endpoints: admin identity exchange and the public presence feed
use crate::{
    context::AppContext,
    discord::{self, DiscordUser, PresenceSnapshot},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Build Discord routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/discord/token", post(exchange_token))
        .route("/api/discord/activity", get(activity))
}

#[derive(Debug, Deserialize)]
struct ExchangeTokenRequest {
    code: Option<String>,
    #[serde(alias = "redirectUri")]
    redirect_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExchangeTokenResponse {
    access_token: String,
    user: DiscordUser,
}

/// Swap the dashboard's authorization code for an access token and the
/// profile it belongs to. The dashboard keeps the token and presents it
/// in the `discord-token` header on admin calls.
async fn exchange_token(
    State(ctx): State<AppContext>,
    Json(req): Json<ExchangeTokenRequest>,
) -> ApiResult<Json<ExchangeTokenResponse>> {
    let code = req
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Authorization code is required".to_string()))?;
    let redirect_uri = req
        .redirect_uri
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Validation("Redirect URI is required".to_string()))?;

    let (access_token, user) = ctx.discord.exchange_code(&code, &redirect_uri).await?;

    Ok(Json(ExchangeTokenResponse { access_token, user }))
}

/// Public presence feed for the status widget.
///
/// Relay trouble is the widget's problem to shrug off, not the visitor's:
/// any failure downgrades to a labeled synthetic snapshot.
async fn activity(State(ctx): State<AppContext>) -> Json<PresenceSnapshot> {
    match ctx.discord.presence().await {
        Ok(snapshot) => Json(snapshot),
        Err(e) => {
            warn!("Presence relay unavailable, serving fallback: {}", e);
            Json(discord::fallback_snapshot())
        }
    }
}
