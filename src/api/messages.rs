/// Contact inbox endpoints
///
/// Submission is public; listing and triage are admin-only. A storage
/// outage must not swallow a visitor's message silently, so submission
/// records the content in the log before failing the request.
use crate::{
    auth::AdminAuth,
    context::AppContext,
    error::{ApiError, ApiResult},
    store::models::{Message, NewMessage},
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

/// Build message routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/messages", get(list_messages).post(submit_message))
        .route("/api/messages/:id/read", patch(mark_read))
        .route("/api/messages/:id", delete(delete_message))
}

#[derive(Debug, Deserialize, Validate)]
struct SubmitMessageRequest {
    #[validate(required(message = "name is required"), length(min = 1))]
    name: Option<String>,
    #[validate(
        required(message = "email is required"),
        email(message = "invalid email address")
    )]
    email: Option<String>,
    #[validate(required(message = "subject is required"), length(min = 1))]
    subject: Option<String>,
    #[validate(required(message = "message is required"), length(min = 1))]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitMessageResponse {
    success: bool,
    message: String,
    id: i64,
}

/// Accept a contact-form submission from an anonymous visitor
async fn submit_message(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<SubmitMessageRequest>,
) -> ApiResult<Json<SubmitMessageResponse>> {
    req.validate()
        .map_err(|e| ApiError::Validation(format!("Invalid contact submission: {}", e)))?;

    let new = NewMessage {
        name: req.name.unwrap_or_default().trim().to_string(),
        email: req.email.unwrap_or_default().trim().to_string(),
        subject: req.subject.unwrap_or_default().trim().to_string(),
        body: req.message.unwrap_or_default().trim().to_string(),
        ip_address: client_ip(&headers),
        user_agent: header_string(&headers, "user-agent"),
    };

    match ctx.store.create_message(new.clone()).await {
        Ok(message) => {
            info!(
                from = %message.name,
                subject = %message.subject,
                "📨 New message received"
            );
            Ok(Json(SubmitMessageResponse {
                success: true,
                message: "Message sent successfully".to_string(),
                id: message.id,
            }))
        }
        Err(e) => {
            // One fallback: record the submission in the log so it is not
            // lost entirely, then surface the failure. Submission is the
            // one essential write in this service.
            warn!("Store unavailable for contact submission: {}", e);
            info!(
                from = %new.name,
                email = %new.email,
                subject = %new.subject,
                "📨 New message received (logged only)"
            );
            Err(ApiError::Storage(format!(
                "Failed to persist message: {}",
                e
            )))
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageView {
    id: i64,
    name: String,
    email: String,
    subject: String,
    message: String,
    read: bool,
    timestamp: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            name: message.name,
            email: message.email,
            subject: message.subject,
            message: message.body,
            read: message.read,
            timestamp: message.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ListMessagesResponse {
    messages: Vec<MessageView>,
    #[serde(rename = "totalCount")]
    total_count: usize,
    #[serde(rename = "unreadCount")]
    unread_count: i64,
}

/// List the inbox for the dashboard
async fn list_messages(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
) -> ApiResult<Json<ListMessagesResponse>> {
    let (messages, unread_count) =
        futures::join!(ctx.store.list_messages(), ctx.store.unread_count());
    let messages = messages?;
    let unread_count = unread_count?;

    Ok(Json(ListMessagesResponse {
        total_count: messages.len(),
        messages: messages.into_iter().map(MessageView::from).collect(),
        unread_count,
    }))
}

#[derive(Debug, Serialize)]
struct AckResponse {
    success: bool,
    message: String,
}

/// Flip a message to read. Repeating the call is harmless.
async fn mark_read(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<AckResponse>> {
    ctx.store.mark_read(id).await?;

    Ok(Json(AckResponse {
        success: true,
        message: "Message marked as read".to_string(),
    }))
}

/// Remove a message permanently
async fn delete_message(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<AckResponse>> {
    ctx.store.delete_message(id).await?;

    Ok(Json(AckResponse {
        success: true,
        message: "Message deleted".to_string(),
    }))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Best-effort client address from proxy headers
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "x-forwarded-for")
        .map(|list| list.split(',').next().unwrap_or("").trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_string(headers, "x-real-ip"))
}
