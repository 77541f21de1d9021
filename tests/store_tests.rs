/// File-backed store tests
///
/// The in-memory contract tests live next to the store module; these
/// verify that a real database file survives a reconnect, which is what
/// the process-wide pool relies on across restarts.
use portfolio_hub::store::{
    models::{NewMessage, TokenUpsert},
    sqlite::SqliteBackend,
    Store,
};
use std::sync::Arc;

async fn open(path: &str) -> Store {
    let backend = SqliteBackend::connect(path).await.unwrap();
    Store::new(Arc::new(backend))
}

#[tokio::test]
async fn test_data_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portfolio.db");
    let path = path.to_str().unwrap();

    {
        let store = open(path).await;

        store
            .create_message(NewMessage {
                name: "A".to_string(),
                email: "a@b.com".to_string(),
                subject: "hi".to_string(),
                body: "hello".to_string(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        store
            .save_token(
                "spotify",
                TokenUpsert {
                    access_token: "access".to_string(),
                    refresh_token: Some("refresh".to_string()),
                    expires_in: Some(3600),
                },
            )
            .await
            .unwrap();
    }

    // Fresh pool over the same file
    let store = open(path).await;

    let messages = store.list_messages().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "hi");

    let token = store.get_token("spotify").await.unwrap();
    assert_eq!(token.access_token, "access");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn test_schema_init_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portfolio.db");
    let path = path.to_str().unwrap();

    // Connecting twice re-runs the schema statements against existing
    // tables and must not disturb the seeded settings rows.
    let first = open(path).await;
    let settings = first.activity_settings().await.unwrap();
    assert!(settings.show_discord);

    let second = open(path).await;
    let settings = second.activity_settings().await.unwrap();
    assert!(settings.show_discord);
}
