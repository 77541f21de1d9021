/// Composed status endpoints
///
/// The public widget wants one round trip for "what is he up to right
/// now"; the dashboard wants a health readout of its connections.
use crate::{
    auth::AdminAuth,
    context::AppContext,
    discord,
    spotify::NowPlaying,
};
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

/// Build status routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/status", get(public_status))
        .route("/api/admin/status", get(admin_status))
}

/// Public widget payload: Discord presence and Spotify now-playing,
/// fetched concurrently. Either side failing degrades just that side.
async fn public_status(State(ctx): State<AppContext>) -> Json<Value> {
    let (presence, now_playing) = futures::join!(
        ctx.discord.presence(),
        ctx.spotify.current_track(None)
    );

    let discord = match presence {
        Ok(snapshot) => serde_json::to_value(snapshot).unwrap_or(Value::Null),
        Err(e) => {
            warn!("Presence relay unavailable, serving fallback: {}", e);
            serde_json::to_value(discord::fallback_snapshot()).unwrap_or(Value::Null)
        }
    };

    let spotify = match now_playing {
        Ok(NowPlaying::Playing(track)) => serde_json::to_value(&*track).unwrap_or(Value::Null),
        Ok(NowPlaying::NotPlaying) => json!({ "isPlaying": false }),
        // Not connected or token trouble: the widget just hides the card
        Err(_) => Value::Null,
    };

    Json(json!({
        "discord": discord,
        "spotify": spotify,
        "lastUpdated": Utc::now(),
    }))
}

/// Connection health for the dashboard
async fn admin_status(State(ctx): State<AppContext>, _auth: AdminAuth) -> Json<Value> {
    let (spotify_connected, store_ok) =
        futures::join!(ctx.spotify.is_connected(), ctx.store.ping());

    let (connected, spotify_error) = match spotify_connected {
        Ok(connected) => (connected, None),
        Err(e) => (false, Some(e.to_string())),
    };
    let (database_working, database_error) = match store_ok {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    let message = if connected {
        "All systems operational. Spotify activity is live on the public site."
    } else {
        "Connect Spotify in the dashboard to show real-time music activity to visitors."
    };

    Json(json!({
        "success": true,
        "status": {
            "spotify": { "connected": connected, "error": spotify_error },
            "database": { "working": database_working, "error": database_error },
        },
        "message": message,
    }))
}
