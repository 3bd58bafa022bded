//! User directory routes: listing with search, block management, deletion.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::error::AppError;
use crate::storage::get_connection;
use crate::storage::users::{
    delete_user, get_user, rename_user, search_users, set_blocked, toggle_blocked, StatusFilter, TelegramUser,
};

use super::AdminState;

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/users", get(index))
        .route("/api/users/{id}", get(show).patch(update).delete(destroy))
        .route("/api/users/{id}/toggle", post(toggle))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
}

async fn index(
    State(state): State<AdminState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TelegramUser>>, AppError> {
    let status = match query.status.as_deref() {
        Some("active") => StatusFilter::Active,
        Some("blocked") => StatusFilter::Blocked,
        Some("") | None => StatusFilter::Any,
        Some(other) => return Err(AppError::Validation(format!("Unknown status filter: {other}"))),
    };
    let limit = query.limit.unwrap_or(50).min(500);

    let conn = get_connection(&state.db)?;
    let users = search_users(&conn, query.search.as_deref().filter(|s| !s.is_empty()), status, limit)?;
    Ok(Json(users))
}

async fn show(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<TelegramUser>, AppError> {
    let conn = get_connection(&state.db)?;
    get_user(&conn, id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    is_blocked: Option<bool>,
    first_name: Option<String>,
    last_name: Option<String>,
}

async fn update(
    State(state): State<AdminState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<TelegramUser>, AppError> {
    let conn = get_connection(&state.db)?;

    if body.first_name.is_some() || body.last_name.is_some() {
        if !rename_user(&conn, id, body.first_name.as_deref(), body.last_name.as_deref())? {
            return Err(AppError::NotFound(format!("user {id}")));
        }
    }
    if let Some(blocked) = body.is_blocked {
        if !set_blocked(&conn, id, blocked)? {
            return Err(AppError::NotFound(format!("user {id}")));
        }
    }

    get_user(&conn, id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

async fn toggle(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let is_blocked = toggle_blocked(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
    Ok(Json(json!({ "is_blocked": is_blocked })))
}

async fn destroy(State(state): State<AdminState>, Path(id): Path<i64>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    if !delete_user(&conn, id)? {
        return Err(AppError::NotFound(format!("user {id}")));
    }
    Ok(Json(json!({ "deleted": true })))
}
