//! Webhook receiver for provider updates.
//!
//! The HTTP acknowledgement is a transport-level contract: the handler
//! always answers `{"ok": true}` with 200, whatever happens inside. Internal
//! routing failures are logged and swallowed; re-delivery of a broken
//! update would fail the same way again.

use axum::{body::Bytes, extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::error::AppResult;
use crate::storage::db::DbPool;
use crate::storage::users::{upsert_user, UserProfile};
use crate::storage::{get_connection, MediaStore};
use crate::telegram::api::ApiClient;
use crate::telegram::matcher::{match_message, send_command_response};
use crate::telegram::types::Update;

/// Shared state for the webhook route.
#[derive(Clone)]
pub struct WebhookState {
    pub db: Arc<DbPool>,
    pub api: Arc<ApiClient>,
    pub media: Arc<MediaStore>,
}

/// Router exposing `POST /telegram/webhook`.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/telegram/webhook", post(webhook_handler))
        .with_state(state)
}

async fn webhook_handler(State(state): State<WebhookState>, body: Bytes) -> Json<Value> {
    // Lenient parse: anything unrecognizable is treated as not-a-message.
    // The raw body is taken instead of a Json extractor so a malformed
    // payload still gets its acknowledgement.
    let update: Update = serde_json::from_slice(&body).unwrap_or_default();

    if let Err(e) = process_update(&state, update).await {
        log::error!("Webhook update processing failed: {}", e);
    }

    Json(json!({"ok": true}))
}

/// Routes one update: upsert the sender, drop blocked senders, delegate to
/// the matcher. Non-message updates are ignored.
async fn process_update(state: &WebhookState, update: Update) -> AppResult<()> {
    let Some(message) = update.message else {
        return Ok(());
    };

    let chat_id = message.chat.id;
    let text = message.text.as_deref().unwrap_or("");

    if let Some(sender) = &message.from {
        let conn = get_connection(&state.db)?;
        let user = upsert_user(
            &conn,
            sender.id,
            &UserProfile {
                first_name: sender.first_name.as_deref(),
                last_name: sender.last_name.as_deref(),
                username: sender.username.as_deref(),
                language_code: sender.language_code.as_deref(),
                is_bot: sender.is_bot,
            },
        )?;

        if user.is_blocked {
            log::debug!("Dropping message from blocked user {}", sender.id);
            return Ok(());
        }
    }

    let matched = {
        let conn = get_connection(&state.db)?;
        match_message(&conn, text)?
    };

    if let Some(command) = matched {
        let response = send_command_response(&state.api, &state.media, chat_id, &command, message.from.as_ref()).await;
        if !response.ok {
            log::warn!(
                "Command response for trigger '{}' failed: {}",
                command.trigger,
                response.description()
            );
        }
    }

    Ok(())
}
