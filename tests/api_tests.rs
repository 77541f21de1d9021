/// Router-level tests for the JSON API
///
/// Each test gets its own in-memory SQLite store and drives the real
/// router through tower's `oneshot`, so handler wiring, extractors, and
/// status mapping are all exercised. Endpoints that need a live third
/// party are covered by unit tests on their pure logic instead.
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use portfolio_hub::{
    config::{
        AdminConfig, DiscordConfig, GithubConfig, LoggingConfig, ServerConfig, ServiceConfig,
        SpotifyConfig, StorageConfig,
    },
    context::AppContext,
    server::build_router,
    store::{sqlite::SqliteBackend, Store},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_KEY: &str = "test-admin-key";

fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig::Sqlite {
            path: ":memory:".to_string(),
        },
        admin: AdminConfig {
            api_key: Some(ADMIN_KEY.to_string()),
        },
        // Unroutable hosts so an accidental upstream call fails fast
        spotify: SpotifyConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://127.0.0.1:0/callback".to_string(),
            accounts_url: "http://127.0.0.1:1".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
        },
        discord: DiscordConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            authorized_user_id: "42".to_string(),
            presence_user_id: "42".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
            relay_url: "http://127.0.0.1:1".to_string(),
        },
        github: GithubConfig {
            username: "someone".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

async fn test_app() -> Router {
    let backend = SqliteBackend::connect(":memory:").await.unwrap();
    let store = Store::new(Arc::new(backend));
    let ctx = AppContext::with_store(test_config(), store).unwrap();
    build_router(ctx)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-admin-key", ADMIN_KEY)
        .body(Body::empty())
        .unwrap()
}

fn submit_body() -> Value {
    json!({
        "name": "A",
        "email": "a@b.com",
        "subject": "hi",
        "message": "hello"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Request::builder().uri("/api/nope").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("NotFound"));
}

#[tokio::test]
async fn test_submit_then_list_messages() {
    let app = test_app().await;

    let (status, body) = send(&app, post_json("/api/messages", submit_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let id = body["id"].as_i64().expect("numeric id");

    let (status, body) = send(&app, admin_get("/api/messages")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], json!(1));
    assert_eq!(body["unreadCount"], json!(1));
    assert_eq!(body["messages"][0]["id"], json!(id));
    assert_eq!(body["messages"][0]["read"], json!(false));
    assert_eq!(body["messages"][0]["message"], json!("hello"));
}

#[tokio::test]
async fn test_identical_submissions_create_two_rows() {
    let app = test_app().await;

    send(&app, post_json("/api/messages", submit_body())).await;
    send(&app, post_json("/api/messages", submit_body())).await;

    let (_, body) = send(&app, admin_get("/api/messages")).await;
    assert_eq!(body["totalCount"], json!(2));
}

#[tokio::test]
async fn test_submit_rejects_missing_fields() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        post_json(
            "/api/messages",
            json!({ "email": "a@b.com", "subject": "hi", "message": "hello" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, admin_get("/api/messages")).await;
    assert_eq!(body["totalCount"], json!(0));
}

#[tokio::test]
async fn test_submit_rejects_invalid_email() {
    let app = test_app().await;

    let mut payload = submit_body();
    payload["email"] = json!("not-an-email");
    let (status, _) = send(&app, post_json("/api/messages", payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, admin_get("/api/messages")).await;
    assert_eq!(body["totalCount"], json!(0));
}

#[tokio::test]
async fn test_admin_endpoints_require_credentials() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/messages")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/messages")
            .header("x-admin-key", "wrong-key")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mark_read_is_idempotent() {
    let app = test_app().await;

    let (_, body) = send(&app, post_json("/api/messages", submit_body())).await;
    let id = body["id"].as_i64().unwrap();

    for _ in 0..2 {
        let (status, body) = send(
            &app,
            Request::builder()
                .method("PATCH")
                .uri(format!("/api/messages/{}/read", id))
                .header("x-admin-key", ADMIN_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
    }

    let (_, body) = send(&app, admin_get("/api/messages")).await;
    assert_eq!(body["messages"][0]["read"], json!(true));
    assert_eq!(body["unreadCount"], json!(0));
}

#[tokio::test]
async fn test_delete_message_then_404() {
    let app = test_app().await;

    let (_, body) = send(&app, post_json("/api/messages", submit_body())).await;
    let id = body["id"].as_i64().unwrap();

    let delete_request = |id: i64| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/messages/{}", id))
            .header("x-admin-key", ADMIN_KEY)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, delete_request(id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, delete_request(id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, admin_get("/api/messages")).await;
    assert_eq!(body["totalCount"], json!(0));
}

#[tokio::test]
async fn test_repository_settings_flow() {
    let app = test_app().await;

    // Public read serves the seeded defaults
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/settings/repositories")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hidden_repos"], json!([]));
    assert_eq!(body["featured_repos"], json!([]));

    // Writes are admin-only
    let (status, _) = send(
        &app,
        post_json(
            "/api/settings/repositories",
            json!({ "hidden_repos": ["scratch"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/settings/repositories")
            .header("content-type", "application/json")
            .header("x-admin-key", ADMIN_KEY)
            .body(Body::from(
                json!({ "hidden_repos": ["scratch"] }).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hidden_repos"], json!(["scratch"]));
    // Unpatched field untouched
    assert_eq!(body["featured_repos"], json!([]));
}

#[tokio::test]
async fn test_activity_settings_flow() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/settings/activity")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["show_discord"], json!(true));
    assert_eq!(body["show_gaming"], json!(true));

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/settings/activity")
            .header("content-type", "application/json")
            .header("x-admin-key", ADMIN_KEY)
            .body(Body::from(json!({ "show_gaming": false }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["show_gaming"], json!(false));
    assert_eq!(body["show_discord"], json!(true));
}

#[tokio::test]
async fn test_spotify_token_exchange_requires_code() {
    let app = test_app().await;

    let (status, _) = send(&app, post_json("/api/spotify/token", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_spotify_disconnect_is_idempotent() {
    let app = test_app().await;

    for _ in 0..2 {
        let (status, body) = send(&app, post_json("/api/spotify/disconnect", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
    }
}

#[tokio::test]
async fn test_current_track_without_connection_is_401() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/spotify/current-track")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_discord_token_exchange_requires_code() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        post_json("/api/discord/token", json!({ "redirect_uri": "http://x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_discord_activity_never_fails() {
    let app = test_app().await;

    // The relay host is unroutable, so this exercises the fallback path.
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/discord/activity")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], json!("fallback"));
    assert_eq!(body["status"], json!("online"));
}
