//! Thin client for the Telegram Bot API.
//!
//! One outbound HTTP call per logical send, hiding the transport split
//! between plain JSON posts and multipart file uploads. Every call,
//! including the unconfigured and transport-failure cases, resolves to the
//! same [`ApiResponse`] shape, so callers branch on `ok` and nothing else.
//! The credential is swappable at runtime; an update takes effect for the
//! next call without a restart.

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::config;
use crate::storage::types::{MediaKind, ParseMode};

/// Normalized provider response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ApiResponse {
    /// Synthesized failure carrying a description, used for every non-HTTP
    /// failure path so the caller sees one uniform shape.
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            description: Some(description.into()),
        }
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("Unknown error")
    }
}

/// Optional send parameters shared by all send primitives.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub parse_mode: ParseMode,
    /// Serialized `reply_markup` JSON (inline keyboard)
    pub reply_markup: Option<String>,
}

/// Client over the bot HTTP API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
    base_url: String,
}

impl ApiClient {
    /// Creates a client against the configured API base URL.
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, config::TELEGRAM_API_URL.clone())
    }

    /// Creates a client against an explicit base URL (local Bot API server,
    /// test double).
    pub fn with_base_url(token: Option<String>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()
            .unwrap_or_default();
        Self {
            http,
            token: Arc::new(RwLock::new(token.filter(|t| !t.is_empty()))),
            base_url: base_url.into(),
        }
    }

    /// True when a credential is present.
    pub async fn is_configured(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Swaps the credential for all subsequent calls.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token.filter(|t| !t.is_empty());
    }

    async fn method_url(&self, method: &str) -> Option<String> {
        let token = self.token.read().await;
        token
            .as_deref()
            .map(|t| format!("{}/bot{}/{}", self.base_url.trim_end_matches('/'), t, method))
    }

    /// Sends one JSON-bodied API call.
    ///
    /// Fails closed: without a credential no network I/O is attempted and a
    /// synthetic failure comes back instead.
    pub async fn call(&self, method: &str, params: Value) -> ApiResponse {
        let Some(url) = self.method_url(method).await else {
            return ApiResponse::failure("Bot token is not configured");
        };

        match self.http.post(&url).json(&params).send().await {
            Ok(response) => match response.json::<ApiResponse>().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::error!("Telegram API {} returned an unparsable body: {}", method, e);
                    ApiResponse::failure("Empty response")
                }
            },
            Err(e) => {
                log::error!("Telegram API error: {}", e);
                ApiResponse::failure(e.to_string())
            }
        }
    }

    /// Sends one multipart API call with the file streamed from disk under
    /// the given form field.
    pub async fn call_with_file(
        &self,
        method: &str,
        params: Vec<(String, String)>,
        file_field: &'static str,
        file_path: &Path,
    ) -> ApiResponse {
        let Some(url) = self.method_url(method).await else {
            return ApiResponse::failure("Bot token is not configured");
        };

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let bytes = match tokio::fs::read(file_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Failed to read media file {}: {}", file_path.display(), e);
                return ApiResponse::failure(format!("Failed to read media file: {e}"));
            }
        };

        let mut form = reqwest::multipart::Form::new().part(
            file_field,
            reqwest::multipart::Part::bytes(bytes).file_name(file_name),
        );
        for (key, value) in params {
            form = form.text(key, value);
        }

        match self.http.post(&url).multipart(form).send().await {
            Ok(response) => match response.json::<ApiResponse>().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::error!("Telegram API {} returned an unparsable body: {}", method, e);
                    ApiResponse::failure("Empty response")
                }
            },
            Err(e) => {
                log::error!("Telegram API error: {}", e);
                ApiResponse::failure(e.to_string())
            }
        }
    }

    /// Sends a plain text message.
    pub async fn send_text(&self, chat_id: i64, text: &str, options: &SendOptions) -> ApiResponse {
        let mut params = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = options.parse_mode.as_api_value() {
            params["parse_mode"] = json!(mode);
        }
        if let Some(markup) = &options.reply_markup {
            params["reply_markup"] = json!(markup);
        }
        self.call("sendMessage", params).await
    }

    /// Sends a media message with the rendered text as caption.
    ///
    /// The send primitive is picked from the media kind's method table;
    /// calling this with `MediaKind::None` is a caller bug and comes back as
    /// a uniform failure rather than a panic.
    pub async fn send_media(
        &self,
        kind: MediaKind,
        chat_id: i64,
        file_path: &Path,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> ApiResponse {
        let Some((method, field)) = kind.send_method() else {
            return ApiResponse::failure("No media kind to send");
        };

        let mut params = vec![("chat_id".to_string(), chat_id.to_string())];
        if let Some(caption) = caption {
            params.push(("caption".to_string(), caption.to_string()));
        }
        if let Some(mode) = options.parse_mode.as_api_value() {
            params.push(("parse_mode".to_string(), mode.to_string()));
        }
        if let Some(markup) = &options.reply_markup {
            params.push(("reply_markup".to_string(), markup.clone()));
        }

        self.call_with_file(method, params, field, file_path).await
    }

    pub async fn send_photo(&self, chat_id: i64, path: &Path, caption: Option<&str>, options: &SendOptions) -> ApiResponse {
        self.send_media(MediaKind::Photo, chat_id, path, caption, options).await
    }

    pub async fn send_video(&self, chat_id: i64, path: &Path, caption: Option<&str>, options: &SendOptions) -> ApiResponse {
        self.send_media(MediaKind::Video, chat_id, path, caption, options).await
    }

    pub async fn send_audio(&self, chat_id: i64, path: &Path, caption: Option<&str>, options: &SendOptions) -> ApiResponse {
        self.send_media(MediaKind::Audio, chat_id, path, caption, options).await
    }

    pub async fn send_voice(&self, chat_id: i64, path: &Path, caption: Option<&str>, options: &SendOptions) -> ApiResponse {
        self.send_media(MediaKind::Voice, chat_id, path, caption, options).await
    }

    pub async fn send_document(&self, chat_id: i64, path: &Path, caption: Option<&str>, options: &SendOptions) -> ApiResponse {
        self.send_media(MediaKind::Document, chat_id, path, caption, options).await
    }

    /// Deletes one previously sent message.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> ApiResponse {
        self.call("deleteMessage", json!({"chat_id": chat_id, "message_id": message_id}))
            .await
    }

    /// Registers the webhook URL with the provider.
    pub async fn set_webhook(&self, url: &str) -> ApiResponse {
        self.call("setWebhook", json!({"url": url})).await
    }

    /// Removes the registered webhook.
    pub async fn delete_webhook(&self) -> ApiResponse {
        self.call("deleteWebhook", json!({})).await
    }

    /// Current webhook registration as the provider sees it.
    pub async fn get_webhook_info(&self) -> ApiResponse {
        self.call("getWebhookInfo", json!({})).await
    }

    /// Identity of the configured bot.
    pub async fn get_me(&self) -> ApiResponse {
        self.call("getMe", json!({})).await
    }
}
