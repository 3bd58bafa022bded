//! Broadcast routes: submission, listing, and the progress poll.

use axum::extract::{Multipart, Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::broadcast::BroadcastDraft;
use crate::core::error::AppError;
use crate::storage::broadcasts::{broadcast_stats, get_broadcast, get_progress, list_broadcasts};
use crate::storage::get_connection;
use crate::storage::media::BROADCAST_MEDIA_DIR;
use crate::storage::types::{MediaKind, RecipientKind};
use crate::storage::users::{search_users, StatusFilter};

use super::{normalize_buttons, parse_enum_field, read_form, AdminState};

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/broadcasts", get(index).post(create))
        .route("/api/broadcasts/{id}", get(show))
        .route("/api/broadcasts/{id}/progress", get(progress))
        .route("/api/broadcasts/recipients", get(search_recipients))
}

async fn index(State(state): State<AdminState>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let broadcasts = list_broadcasts(&conn, 50)?;
    let stats = broadcast_stats(&conn)?;

    let rows: Vec<Value> = broadcasts
        .into_iter()
        .map(|b| {
            let progress = b.progress_percentage();
            let mut row = serde_json::to_value(&b).unwrap_or_default();
            row["progress"] = json!(progress);
            row
        })
        .collect();

    Ok(Json(json!({ "broadcasts": rows, "stats": stats })))
}

/// POST /api/broadcasts: create a job and hand it to the dispatcher.
///
/// The response carries the job id; delivery progress is read from the
/// polling endpoint. Recipient resolution happens inside the dispatcher so
/// the snapshot is frozen exactly once.
async fn create(State(state): State<AdminState>, multipart: Multipart) -> Result<Json<Value>, AppError> {
    let (fields, file) = read_form(multipart).await?;

    let message = fields
        .get("message")
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Message is required".into()))?
        .clone();

    let parse_mode = parse_enum_field(&fields, "parse_mode")?;
    let media_kind: MediaKind = parse_enum_field(&fields, "media_kind")?;
    let recipient_kind: RecipientKind = parse_enum_field(&fields, "recipient_kind")?;
    let buttons = normalize_buttons(&fields)?;

    let recipient_ids: Vec<i64> = match fields.get("recipient_ids").filter(|r| !r.trim().is_empty()) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("Invalid recipient_ids JSON: {e}")))?,
        None => Vec::new(),
    };

    let media_path = match (&file, media_kind) {
        (Some(upload), kind) if kind != MediaKind::None => {
            Some(state.media.store(BROADCAST_MEDIA_DIR, &upload.name, &upload.bytes)?)
        }
        _ => None,
    };

    let draft = BroadcastDraft {
        message,
        parse_mode,
        media_kind,
        media_path,
        buttons,
        recipient_kind,
        recipient_ids,
    };

    let id = state.dispatcher.submit(&draft).await?;
    Ok(Json(json!({ "id": id })))
}

async fn show(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let broadcast = get_broadcast(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("broadcast {id}")))?;

    let progress = broadcast.progress_percentage();
    let mut row = serde_json::to_value(&broadcast)?;
    row["progress"] = json!(progress);
    Ok(Json(row))
}

/// GET /api/broadcasts/{id}/progress: the polling contract.
async fn progress(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let progress = get_progress(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("broadcast {id}")))?;
    Ok(Json(serde_json::to_value(progress)?))
}

#[derive(Debug, Deserialize)]
struct RecipientQuery {
    search: Option<String>,
}

/// GET /api/broadcasts/recipients: active users for the selection picker.
async fn search_recipients(
    State(state): State<AdminState>,
    Query(query): Query<RecipientQuery>,
) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let users = search_users(
        &conn,
        query.search.as_deref().filter(|s| !s.is_empty()),
        StatusFilter::Active,
        20,
    )?;

    let rows: Vec<Value> = users
        .into_iter()
        .map(|u| {
            json!({
                "id": u.id,
                "telegram_id": u.telegram_id,
                "first_name": u.first_name,
                "last_name": u.last_name,
                "username": u.username,
            })
        })
        .collect();

    Ok(Json(json!(rows)))
}
