//! Conversation-threaded messaging: authenticated chat, guest chat and
//! contact-form submissions. Transport (websockets, mail) is external; this
//! is persistence only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{Error, Result};
use crate::models::{Message, MessageKind};
use crate::AppState;

/// Messages older than this are purged by the daily sweep, mirroring the
/// cancelled-order retention window.
pub const MESSAGE_RETENTION_DAYS: i64 = 7;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/messages", post(send_message))
        .route("/guest", post(send_guest_message))
        .route("/guest/:email", get(guest_conversation))
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: i64,
    pub last_message: Message,
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    conversation_id: String,
    sender_id: String,
    sender_name: String,
    sender_email: String,
    is_admin: bool,
    kind: MessageKind,
    subject: Option<String>,
    body: String,
    created_at: DateTime<Utc>,
    message_count: i64,
}

async fn list_conversations(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ConversationSummary>>> {
    let rows = sqlx::query_as::<_, ConversationRow>(
        "SELECT m.*, counts.message_count FROM \
           (SELECT DISTINCT ON (conversation_id) * FROM messages \
            ORDER BY conversation_id, created_at DESC) m \
         JOIN (SELECT conversation_id, COUNT(*) AS message_count FROM messages \
               GROUP BY conversation_id) counts USING (conversation_id) \
         ORDER BY m.created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    let summaries = rows
        .into_iter()
        .map(|row| ConversationSummary {
            conversation_id: row.conversation_id.clone(),
            message_count: row.message_count,
            last_message: Message {
                id: row.id,
                conversation_id: row.conversation_id,
                sender_id: row.sender_id,
                sender_name: row.sender_name,
                sender_email: row.sender_email,
                is_admin: row.is_admin,
                kind: row.kind,
                subject: row.subject,
                body: row.body,
                created_at: row.created_at,
            },
        })
        .collect();
    Ok(Json(summaries))
}

async fn get_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at",
    )
    .bind(&conversation_id)
    .fetch_all(&state.db)
    .await?;

    // Participants are the thread opener and the user the thread is keyed by.
    if let Some(first) = messages.first() {
        let caller = user.id.to_string();
        let is_participant =
            first.sender_id == caller || first.conversation_id == caller || user.is_admin();
        if !is_participant {
            return Err(Error::Forbidden);
        }
    }
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
    pub conversation_id: Option<String>,
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(Error::Validation("Message text is required".to_string()));
    }
    // A user's own thread is keyed by their id.
    let conversation_id = req
        .conversation_id
        .unwrap_or_else(|| user.id.to_string());

    let message = insert_message(
        &state.db,
        NewMessage {
            conversation_id,
            sender_id: user.id.to_string(),
            sender_name: user.username.clone(),
            sender_email: user.email.clone(),
            is_admin: user.is_admin(),
            kind: MessageKind::Chat,
            subject: None,
            body: body.to_string(),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GuestMessageRequest {
    #[validate(length(min = 1, message = "Message text is required"))]
    pub body: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub guest_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub guest_email: String,
    #[serde(default)]
    pub contact_form: bool,
    pub subject: Option<String>,
}

async fn send_guest_message(
    State(state): State<AppState>,
    Json(req): Json<GuestMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    req.validate()?;
    let body = req.body.trim();
    if body.is_empty() {
        return Err(Error::Validation("Message text is required".to_string()));
    }

    // Contact forms get a fresh thread per submission; guest chat reuses one
    // thread per email.
    let (conversation_id, kind) = if req.contact_form {
        (
            format!("contact-{}-{}", req.guest_email, Utc::now().timestamp_millis()),
            MessageKind::ContactForm,
        )
    } else {
        (format!("guest-{}", req.guest_email), MessageKind::Chat)
    };

    let message = insert_message(
        &state.db,
        NewMessage {
            conversation_id,
            sender_id: "guest".to_string(),
            sender_name: req.guest_name,
            sender_email: req.guest_email,
            is_admin: false,
            kind,
            subject: req.subject.filter(|_| req.contact_form),
            body: body.to_string(),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn guest_conversation(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Message>>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages \
         WHERE conversation_id = $1 OR (sender_email = $2 AND kind = 'contact_form') \
         ORDER BY created_at",
    )
    .bind(format!("guest-{email}"))
    .bind(&email)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(messages))
}

async fn delete_conversation(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
        .bind(&conversation_id)
        .execute(&state.db)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Conversation deleted successfully" })))
}

struct NewMessage {
    conversation_id: String,
    sender_id: String,
    sender_name: String,
    sender_email: String,
    is_admin: bool,
    kind: MessageKind,
    subject: Option<String>,
    body: String,
}

async fn insert_message(pool: &PgPool, msg: NewMessage) -> Result<Message> {
    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages \
         (id, conversation_id, sender_id, sender_name, sender_email, is_admin, kind, subject, body) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&msg.conversation_id)
    .bind(&msg.sender_id)
    .bind(&msg.sender_name)
    .bind(&msg.sender_email)
    .bind(msg.is_admin)
    .bind(msg.kind)
    .bind(&msg.subject)
    .bind(&msg.body)
    .fetch_one(pool)
    .await?;
    Ok(message)
}

/// Purges messages past the retention window; called by the daily sweep.
pub async fn delete_expired(pool: &PgPool) -> Result<u64> {
    let cutoff = Utc::now() - Duration::days(MESSAGE_RETENTION_DAYS);
    let deleted = sqlx::query("DELETE FROM messages WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(deleted.rows_affected())
}
