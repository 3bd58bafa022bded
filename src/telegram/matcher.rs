//! Matching inbound text to configured trigger-response rules.
//!
//! `/token` prefixes are matched against `command`-kind triggers (arguments
//! and a trailing `@botname` are ignored), everything else against
//! `text`-kind triggers by whole-message equality. No match means no
//! outbound call; silence is the defined behavior.

use rusqlite::Result;

use crate::storage::commands::{find_active_trigger, BotCommand};
use crate::storage::db::DbConnection;
use crate::storage::types::{parse_button_rows, TriggerKind};
use crate::storage::MediaStore;
use crate::telegram::api::{ApiClient, ApiResponse, SendOptions};
use crate::telegram::keyboard::reply_markup_json;
use crate::telegram::types::Sender;

/// Extracts the command token from a message: the leading word, with any
/// `@botname` suffix removed. `"/start@mybot arg"` yields `"/start"`.
pub fn command_token(text: &str) -> Option<&str> {
    if !text.starts_with('/') {
        return None;
    }
    let token = text.split(' ').next().unwrap_or(text);
    Some(token.split('@').next().unwrap_or(token))
}

/// Finds the active rule for an inbound message, if any.
pub fn match_message(conn: &DbConnection, text: &str) -> Result<Option<BotCommand>> {
    if let Some(token) = command_token(text) {
        if let Some(command) = find_active_trigger(conn, TriggerKind::Command, token)? {
            return Ok(Some(command));
        }
    }

    find_active_trigger(conn, TriggerKind::Text, text)
}

/// Substitutes sender placeholders into a response body.
///
/// `{first_name}`, `{username}` and `{user_id}` are replaced with values
/// from the sender; fields the sender did not supply become empty strings.
pub fn render_response(template: &str, sender: Option<&Sender>) -> String {
    let first_name = sender.and_then(|s| s.first_name.as_deref()).unwrap_or("");
    let username = sender.and_then(|s| s.username.as_deref()).unwrap_or("");
    let user_id = sender.map(|s| s.id.to_string()).unwrap_or_default();

    template
        .replace("{first_name}", first_name)
        .replace("{username}", username)
        .replace("{user_id}", &user_id)
}

/// Delivers a matched rule's rendered response to a chat.
///
/// Media-bearing rules go out through the matching media primitive with the
/// rendered text as caption; everything else is a plain text send.
pub async fn send_command_response(
    api: &ApiClient,
    media: &MediaStore,
    chat_id: i64,
    command: &BotCommand,
    sender: Option<&Sender>,
) -> ApiResponse {
    let text = render_response(&command.response, sender);
    let rows = parse_button_rows(command.buttons.as_deref());
    let options = SendOptions {
        parse_mode: command.parse_mode,
        reply_markup: reply_markup_json(&rows),
    };

    if command.has_media() {
        let relative = command.media_path.as_deref().unwrap_or_default();
        match media.full_path(relative) {
            Ok(path) => {
                api.send_media(command.media_kind, chat_id, &path, Some(&text), &options)
                    .await
            }
            Err(e) => {
                log::error!("Command {} has an unusable media path: {}", command.id, e);
                api.send_text(chat_id, &text, &options).await
            }
        }
    } else {
        api.send_text(chat_id, &text, &options).await
    }
}
