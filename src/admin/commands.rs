//! Command CRUD routes.
//!
//! Create and update arrive as multipart forms so a media file can ride
//! along. Stored media follows the rule lifecycle: replaced uploads, a
//! media kind reset to `none`, and rule deletion all remove the old file
//! from the media store.

use axum::extract::{Multipart, Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};

use crate::core::error::AppError;
use crate::storage::commands::{
    create_command, delete_command, get_command, list_commands, toggle_command, update_command, BotCommand,
    CommandInput,
};
use crate::storage::get_connection;
use crate::storage::media::COMMAND_MEDIA_DIR;
use crate::storage::types::MediaKind;

use super::{normalize_buttons, parse_boolean, parse_enum_field, read_form, AdminState};

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/commands", get(index).post(create))
        .route("/api/commands/{id}", get(show).put(update).delete(destroy))
        .route("/api/commands/{id}/toggle", post(toggle))
}

async fn index(State(state): State<AdminState>) -> Result<Json<Vec<BotCommand>>, AppError> {
    let conn = get_connection(&state.db)?;
    Ok(Json(list_commands(&conn)?))
}

async fn show(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<BotCommand>, AppError> {
    let conn = get_connection(&state.db)?;
    get_command(&conn, id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("command {id}")))
}

async fn create(State(state): State<AdminState>, multipart: Multipart) -> Result<Json<Value>, AppError> {
    let (fields, file) = read_form(multipart).await?;

    let trigger = fields
        .get("trigger")
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Trigger is required".into()))?;
    let response = fields
        .get("response")
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Response is required".into()))?;

    let trigger_kind = parse_enum_field(&fields, "trigger_kind")?;
    let parse_mode = parse_enum_field(&fields, "parse_mode")?;
    let media_kind: MediaKind = parse_enum_field(&fields, "media_kind")?;
    let buttons = normalize_buttons(&fields)?;

    let media_path = match (&file, media_kind) {
        (Some(upload), kind) if kind != MediaKind::None => {
            Some(state.media.store(COMMAND_MEDIA_DIR, &upload.name, &upload.bytes)?)
        }
        _ => None,
    };

    let conn = get_connection(&state.db)?;
    let id = create_command(
        &conn,
        &CommandInput {
            trigger,
            trigger_kind,
            response,
            parse_mode,
            media_kind,
            media_path: media_path.as_deref(),
            buttons: buttons.as_deref(),
            is_active: parse_boolean(fields.get("is_active").map(String::as_str), true),
        },
    )?;

    Ok(Json(json!({ "id": id })))
}

async fn update(
    State(state): State<AdminState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let (fields, file) = read_form(multipart).await?;

    let conn = get_connection(&state.db)?;
    let existing = get_command(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("command {id}")))?;

    let trigger = fields
        .get("trigger")
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Trigger is required".into()))?;
    let response = fields
        .get("response")
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Response is required".into()))?;

    let trigger_kind = parse_enum_field(&fields, "trigger_kind")?;
    let parse_mode = parse_enum_field(&fields, "parse_mode")?;
    let media_kind: MediaKind = parse_enum_field(&fields, "media_kind")?;
    let buttons = normalize_buttons(&fields)?;
    let remove_media = parse_boolean(fields.get("remove_media").map(String::as_str), false);

    // Media resolution: explicit removal and a kind of `none` both drop the
    // stored file; a new upload replaces it.
    let mut media_path = existing.media_path.clone();
    if remove_media || media_kind == MediaKind::None {
        if let Some(old) = existing.media_path.as_deref() {
            state.media.delete(old);
        }
        media_path = None;
    }
    if let Some(upload) = &file {
        if media_kind != MediaKind::None {
            if let Some(old) = media_path.as_deref() {
                state.media.delete(old);
            }
            media_path = Some(state.media.store(COMMAND_MEDIA_DIR, &upload.name, &upload.bytes)?);
        }
    }

    update_command(
        &conn,
        id,
        &CommandInput {
            trigger,
            trigger_kind,
            response,
            parse_mode,
            media_kind,
            media_path: media_path.as_deref(),
            buttons: buttons.as_deref(),
            is_active: parse_boolean(fields.get("is_active").map(String::as_str), true),
        },
    )?;

    Ok(Json(json!({ "id": id })))
}

async fn destroy(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let existing = get_command(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("command {id}")))?;

    if let Some(path) = existing.media_path.as_deref() {
        state.media.delete(path);
    }
    delete_command(&conn, id)?;

    Ok(Json(json!({ "deleted": true })))
}

async fn toggle(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let is_active = toggle_command(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("command {id}")))?;
    Ok(Json(json!({ "is_active": is_active })))
}
