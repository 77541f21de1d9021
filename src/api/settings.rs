/// Repository and activity settings endpoints
///
/// Reads are public so the site can filter what it renders; writes are
/// admin-only. A storage failure on the public read degrades to defaults
/// rather than breaking the page.
use crate::{
    auth::AdminAuth,
    context::AppContext,
    error::ApiResult,
    store::models::{
        ActivitySettings, ActivitySettingsPatch, RepositorySettings, RepositorySettingsPatch,
        DEFAULT_USER,
    },
};
use axum::{extract::State, routing::get, Json, Router};
use tracing::warn;

/// Build settings routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/settings/repositories",
            get(get_repository_settings).post(update_repository_settings),
        )
        .route(
            "/api/settings/activity",
            get(get_activity_settings).post(update_activity_settings),
        )
}

async fn get_repository_settings(State(ctx): State<AppContext>) -> Json<RepositorySettings> {
    match ctx.store.repository_settings().await {
        Ok(settings) => Json(settings),
        Err(e) => {
            warn!("Repository settings unavailable, serving defaults: {}", e);
            Json(RepositorySettings::empty(DEFAULT_USER))
        }
    }
}

async fn update_repository_settings(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Json(patch): Json<RepositorySettingsPatch>,
) -> ApiResult<Json<RepositorySettings>> {
    let settings = ctx.store.update_repository_settings(patch).await?;
    Ok(Json(settings))
}

async fn get_activity_settings(State(ctx): State<AppContext>) -> ApiResult<Json<ActivitySettings>> {
    let settings = ctx.store.activity_settings().await?;
    Ok(Json(settings))
}

async fn update_activity_settings(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Json(patch): Json<ActivitySettingsPatch>,
) -> ApiResult<Json<ActivitySettings>> {
    let settings = ctx.store.update_activity_settings(patch).await?;
    Ok(Json(settings))
}
