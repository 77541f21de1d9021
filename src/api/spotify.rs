/// Spotify endpoints: OAuth connect flow and the public now-playing poll
use crate::{
    auth::extract_bearer_token,
    context::AppContext,
    error::{ApiError, ApiResult},
    spotify::{NowPlaying, TokenExchange, SERVICE},
    store::models::TokenUpsert,
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Build Spotify routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/spotify/token", post(exchange_token))
        .route("/api/spotify/save-token", post(save_token))
        .route("/api/spotify/current-track", get(current_track))
        .route("/api/spotify/disconnect", post(disconnect))
}

#[derive(Debug, Deserialize)]
struct ExchangeTokenRequest {
    code: Option<String>,
}

/// Swap the dashboard's authorization code for token material.
///
/// The tokens are handed back to the dashboard, which decides whether to
/// persist them via the save endpoint.
async fn exchange_token(
    State(ctx): State<AppContext>,
    Json(req): Json<ExchangeTokenRequest>,
) -> ApiResult<Json<TokenExchange>> {
    let code = req
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Authorization code is required".to_string()))?;

    let exchanged = ctx.spotify.exchange_code(&code).await?;

    Ok(Json(exchanged))
}

#[derive(Debug, Deserialize)]
struct SaveTokenRequest {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Persist token material so the server can poll on the site's behalf
async fn save_token(
    State(ctx): State<AppContext>,
    Json(req): Json<SaveTokenRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let access_token = req
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing required tokens".to_string()))?;
    let refresh_token = req
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing required tokens".to_string()))?;

    ctx.store
        .save_token(
            SERVICE,
            TokenUpsert {
                access_token,
                refresh_token: Some(refresh_token),
                expires_in: req.expires_in,
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Spotify tokens saved successfully"
    })))
}

/// The public now-playing poll.
///
/// An explicit bearer token short-circuits the stored-token path; the
/// stored token otherwise gets the refresh-once-and-retry treatment.
async fn current_track(State(ctx): State<AppContext>, headers: HeaderMap) -> ApiResult<Response> {
    let bearer = extract_bearer_token(&headers);

    let now_playing = ctx.spotify.current_track(bearer.as_deref()).await?;

    let response = match now_playing {
        NowPlaying::Playing(track) => Json(serde_json::to_value(&*track).unwrap_or_default()),
        NowPlaying::NotPlaying => Json(json!({ "isPlaying": false })),
    };

    Ok(response.into_response())
}

/// Drop the stored grant. Safe to call when nothing is connected.
async fn disconnect(State(ctx): State<AppContext>) -> ApiResult<Json<serde_json::Value>> {
    ctx.spotify.disconnect().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Spotify tokens removed successfully"
    })))
}
