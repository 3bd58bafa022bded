//! Admin-facing JSON surface.
//!
//! The job control contract consumed by the (external) admin UI: command
//! CRUD, the user directory, broadcast submission and progress polling, and
//! bot settings. Handlers stay thin: parse, validate, call into storage or
//! the dispatcher, serialize.

pub mod broadcasts;
pub mod commands;
pub mod settings;
pub mod users;

use axum::extract::multipart::Multipart;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::broadcast::Dispatcher;
use crate::core::config;
use crate::core::error::AppError;
use crate::storage::db::DbPool;
use crate::storage::{commands as command_store, get_connection, users as user_store, MediaStore};
use crate::telegram::api::ApiClient;

/// Shared state for all admin routes.
#[derive(Clone)]
pub struct AdminState {
    pub db: Arc<DbPool>,
    pub api: Arc<ApiClient>,
    pub media: Arc<MediaStore>,
    pub dispatcher: Dispatcher,
}

/// Router exposing the admin surface under `/api`.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard_handler))
        .merge(commands::routes())
        .merge(users::routes())
        .merge(broadcasts::routes())
        .merge(settings::routes())
        // Raise axum's default 2 MiB body cap so media uploads fit; the
        // per-file limit is still enforced in read_form
        .layer(DefaultBodyLimit::max(config::media::MAX_UPLOAD_BYTES + 1024 * 1024))
        .with_state(state)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Admin request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// GET /api/dashboard: headline counts for the landing page.
async fn dashboard_handler(State(state): State<AdminState>) -> Result<Json<serde_json::Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let (total_users, active_users, blocked_users) = user_store::count_users(&conn)?;
    let (total_commands, active_commands) = command_store::count_commands(&conn)?;

    Ok(Json(json!({
        "total_users": total_users,
        "active_users": active_users,
        "blocked_users": blocked_users,
        "total_commands": total_commands,
        "active_commands": active_commands,
        "bot_configured": state.api.is_configured().await,
    })))
}

/// An uploaded file extracted from a multipart form.
pub(crate) struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Drains a multipart form into text fields plus at most one `media` file,
/// enforcing the upload size cap before anything is stored.
pub(crate) async fn read_form(mut multipart: Multipart) -> Result<(HashMap<String, String>, Option<UploadedFile>), AppError> {
    let mut fields = HashMap::new();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "media" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
            if bytes.len() > config::media::MAX_UPLOAD_BYTES {
                return Err(AppError::Validation(format!(
                    "Media file exceeds the {} MiB limit",
                    config::media::MAX_UPLOAD_BYTES / (1024 * 1024)
                )));
            }
            if !bytes.is_empty() {
                file = Some(UploadedFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, file))
}

/// Accepts the loose boolean encodings HTML forms produce.
pub(crate) fn parse_boolean(value: Option<&str>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes"),
    }
}

/// Parses a closed-enum form field, rejecting values outside the set.
pub(crate) fn parse_enum_field<T>(fields: &HashMap<String, String>, name: &str) -> Result<T, AppError>
where
    T: std::str::FromStr + Default,
{
    match fields.get(name) {
        None => Ok(T::default()),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid value for '{name}': {raw}"))),
    }
}

/// Validates button rows JSON from a form field and returns it normalized,
/// or None when absent/empty.
pub(crate) fn normalize_buttons(fields: &HashMap<String, String>) -> Result<Option<String>, AppError> {
    let Some(raw) = fields.get("buttons").filter(|b| !b.trim().is_empty()) else {
        return Ok(None);
    };
    let rows: crate::storage::types::ButtonRows =
        serde_json::from_str(raw).map_err(|e| AppError::Validation(format!("Invalid buttons JSON: {e}")))?;
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&rows)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::ParseMode;

    #[test]
    fn test_parse_boolean_accepts_form_encodings() {
        assert!(parse_boolean(Some("1"), false));
        assert!(parse_boolean(Some("true"), false));
        assert!(parse_boolean(Some("ON"), false));
        assert!(!parse_boolean(Some("0"), true));
        assert!(!parse_boolean(Some("off"), true));
        assert!(parse_boolean(None, true));
    }

    #[test]
    fn test_parse_enum_field_rejects_unknown_values() {
        let mut fields = HashMap::new();
        fields.insert("parse_mode".to_string(), "HTML".to_string());
        let mode: ParseMode = parse_enum_field(&fields, "parse_mode").unwrap();
        assert_eq!(mode, ParseMode::Html);

        fields.insert("parse_mode".to_string(), "BBCode".to_string());
        assert!(parse_enum_field::<ParseMode>(&fields, "parse_mode").is_err());

        let empty = HashMap::new();
        let mode: ParseMode = parse_enum_field(&empty, "parse_mode").unwrap();
        assert_eq!(mode, ParseMode::None);
    }

    #[test]
    fn test_normalize_buttons() {
        let mut fields = HashMap::new();
        assert_eq!(normalize_buttons(&fields).unwrap(), None);

        fields.insert("buttons".to_string(), "[]".to_string());
        assert_eq!(normalize_buttons(&fields).unwrap(), None);

        fields.insert(
            "buttons".to_string(),
            r#"[[{"text":"Go","type":"url","url":"https://x"}]]"#.to_string(),
        );
        assert!(normalize_buttons(&fields).unwrap().is_some());

        fields.insert("buttons".to_string(), "{broken".to_string());
        assert!(normalize_buttons(&fields).is_err());
    }
}
