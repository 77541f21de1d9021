/// API routes and handlers
pub mod discord;
pub mod github;
pub mod messages;
pub mod settings;
pub mod spotify;
pub mod status;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(messages::routes())
        .merge(spotify::routes())
        .merge(discord::routes())
        .merge(github::routes())
        .merge(settings::routes())
        .merge(status::routes())
}
