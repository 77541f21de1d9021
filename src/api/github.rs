/// GitHub endpoints: the public projects grid and the dashboard stats card
use crate::{
    context::AppContext,
    error::ApiResult,
    github::{compute_stats, GithubUser},
};
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

/// Build GitHub routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/repos", get(list_repos))
        .route("/api/github/stats", get(stats))
}

/// Public repository listing: forks and private repos excluded, ordered
/// by the stars-weighted recency score.
async fn list_repos(State(ctx): State<AppContext>) -> ApiResult<Json<serde_json::Value>> {
    let repos = ctx.github.list_public_repos().await?;

    Ok(Json(json!({
        "success": true,
        "total": repos.len(),
        "repos": repos,
    })))
}

/// Derived statistics for the dashboard.
///
/// The three upstream fetches run concurrently and settle together; a
/// failing fetch degrades its own numbers to zero instead of failing the
/// composed response.
async fn stats(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let (user, repos, events) = futures::join!(
        ctx.github.fetch_user(),
        ctx.github.fetch_repos(),
        ctx.github.fetch_events()
    );

    let user = user.unwrap_or_else(|e| {
        warn!("GitHub profile fetch failed: {}", e);
        GithubUser { followers: 0 }
    });
    let repos = repos.unwrap_or_else(|e| {
        warn!("GitHub repo fetch failed: {}", e);
        Vec::new()
    });
    let events = events.unwrap_or_else(|e| {
        warn!("GitHub event fetch failed: {}", e);
        Vec::new()
    });

    let stats = compute_stats(&user, &repos, &events, Utc::now());
    let recent_activity: Vec<_> = events.iter().take(5).collect();

    Json(json!({
        "todaysCommits": stats.todays_commits,
        "activeRepos": stats.active_repos,
        "followers": stats.followers,
        "totalStars": stats.total_stars,
        "recentActivity": recent_activity,
    }))
}
