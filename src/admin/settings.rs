//! Bot settings routes: credential management and webhook registration.
//!
//! Token updates persist to the settings store and hot-swap the running API
//! client, so they apply to the next outbound call without a restart.

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::error::AppError;
use crate::storage::get_connection;
use crate::storage::settings::{
    delete_setting, get_setting, mask_token, set_setting, BOT_TOKEN_KEY, WEBHOOK_URL_KEY,
};

use super::AdminState;

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/api/settings", get(index))
        .route("/api/settings/token", put(update_token))
        .route("/api/settings/webhook", post(set_webhook).delete(delete_webhook))
        .route("/api/settings/webhook-info", get(webhook_info))
        .route("/api/settings/status", get(status))
}

async fn index(State(state): State<AdminState>) -> Result<Json<Value>, AppError> {
    let conn = get_connection(&state.db)?;
    let token = crate::storage::settings::bot_token(&conn)?;
    let webhook_url = get_setting(&conn, WEBHOOK_URL_KEY)?;

    Ok(Json(json!({
        "token_masked": token.as_deref().map(mask_token).unwrap_or_default(),
        "configured": state.api.is_configured().await,
        "webhook_url": webhook_url,
    })))
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: String,
}

async fn update_token(State(state): State<AdminState>, Json(body): Json<TokenBody>) -> Result<Json<Value>, AppError> {
    let token = body.token.trim();
    if token.len() < 40 {
        return Err(AppError::Validation("Token looks too short to be a bot credential".into()));
    }

    {
        let conn = get_connection(&state.db)?;
        set_setting(&conn, BOT_TOKEN_KEY, token)?;
    }
    state.api.set_token(Some(token.to_string())).await;

    Ok(Json(json!({ "updated": true })))
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    url: String,
}

async fn set_webhook(State(state): State<AdminState>, Json(body): Json<WebhookBody>) -> Result<Json<Value>, AppError> {
    let url = body.url.trim();
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(AppError::Validation("Webhook URL must be an http(s) URL".into()));
    }

    let response = state.api.set_webhook(url).await;
    if !response.ok {
        return Ok(Json(json!({ "success": false, "error": response.description() })));
    }

    let conn = get_connection(&state.db)?;
    set_setting(&conn, WEBHOOK_URL_KEY, url)?;

    Ok(Json(json!({ "success": true })))
}

async fn delete_webhook(State(state): State<AdminState>) -> Result<Json<Value>, AppError> {
    let response = state.api.delete_webhook().await;
    if !response.ok {
        return Ok(Json(json!({ "success": false, "error": response.description() })));
    }

    let conn = get_connection(&state.db)?;
    delete_setting(&conn, WEBHOOK_URL_KEY)?;

    Ok(Json(json!({ "success": true })))
}

async fn webhook_info(State(state): State<AdminState>) -> Result<Json<Value>, AppError> {
    let response = state.api.get_webhook_info().await;
    if !response.ok {
        return Ok(Json(json!({ "success": false, "error": response.description() })));
    }
    Ok(Json(json!({ "success": true, "webhook": response.result })))
}

async fn status(State(state): State<AdminState>) -> Result<Json<Value>, AppError> {
    let response = state.api.get_me().await;
    if !response.ok {
        return Ok(Json(json!({ "success": false, "error": response.description() })));
    }
    Ok(Json(json!({ "success": true, "bot": response.result })))
}
