//! Closed enums and button structures shared by commands and broadcasts.
//!
//! Every free-form string the original data model allowed is a tagged
//! variant here; the database stores the canonical text form and
//! `strum` handles both directions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Text-formatting dialect applied by Telegram to an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
pub enum ParseMode {
    #[default]
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    None,
    #[strum(serialize = "HTML")]
    #[serde(rename = "HTML")]
    Html,
    #[strum(serialize = "Markdown")]
    #[serde(rename = "Markdown")]
    Markdown,
    #[strum(serialize = "MarkdownV2")]
    #[serde(rename = "MarkdownV2")]
    MarkdownV2,
}

impl ParseMode {
    /// The `parse_mode` field value for the provider API, or `None` when no
    /// formatting is requested (the field is then omitted entirely).
    pub fn as_api_value(&self) -> Option<&'static str> {
        match self {
            ParseMode::None => None,
            ParseMode::Html => Some("HTML"),
            ParseMode::Markdown => Some("Markdown"),
            ParseMode::MarkdownV2 => Some("MarkdownV2"),
        }
    }
}

/// Kind of media attached to a command response or broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    None,
    Photo,
    Video,
    Audio,
    Voice,
    Document,
}

impl MediaKind {
    /// Provider method used to deliver this media kind, with the multipart
    /// field name the file bytes travel under. `None` maps to plain text.
    pub fn send_method(&self) -> Option<(&'static str, &'static str)> {
        match self {
            MediaKind::None => None,
            MediaKind::Photo => Some(("sendPhoto", "photo")),
            MediaKind::Video => Some(("sendVideo", "video")),
            MediaKind::Audio => Some(("sendAudio", "audio")),
            MediaKind::Voice => Some(("sendVoice", "voice")),
            MediaKind::Document => Some(("sendDocument", "document")),
        }
    }
}

/// How a command's trigger is compared against inbound text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Matches the leading `/token` of a message
    #[default]
    Command,
    /// Matches the whole message exactly
    Text,
}

/// Recipient selector of a broadcast job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    #[default]
    All,
    Selected,
}

/// Broadcast job lifecycle. Transitions only move forward:
/// `Pending -> Processing -> Completed`, or `Pending -> Failed` when the
/// job cannot be dispatched at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BroadcastStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// What tapping an inline button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonKind {
    Url,
    Miniapp,
    Callback,
}

/// One inline keyboard button as configured by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Button {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ButtonKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
}

/// Ordered rows of buttons; stored as JSON in the `buttons` column.
pub type ButtonRows = Vec<Vec<Button>>;

/// Parses the stored `buttons` JSON, treating NULL/empty as no keyboard.
pub fn parse_button_rows(raw: Option<&str>) -> ButtonRows {
    match raw {
        Some(json) if !json.is_empty() => serde_json::from_str(json).unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_mode_round_trip() {
        for (mode, text) in [
            (ParseMode::None, "none"),
            (ParseMode::Html, "HTML"),
            (ParseMode::Markdown, "Markdown"),
            (ParseMode::MarkdownV2, "MarkdownV2"),
        ] {
            assert_eq!(mode.to_string(), text);
            assert_eq!(ParseMode::from_str(text).unwrap(), mode);
        }
    }

    #[test]
    fn test_parse_mode_none_omits_api_field() {
        assert_eq!(ParseMode::None.as_api_value(), None);
        assert_eq!(ParseMode::MarkdownV2.as_api_value(), Some("MarkdownV2"));
    }

    #[test]
    fn test_media_kind_send_method_table() {
        assert_eq!(MediaKind::None.send_method(), None);
        assert_eq!(MediaKind::Photo.send_method(), Some(("sendPhoto", "photo")));
        assert_eq!(MediaKind::Voice.send_method(), Some(("sendVoice", "voice")));
        assert_eq!(MediaKind::Document.send_method(), Some(("sendDocument", "document")));
    }

    #[test]
    fn test_button_rows_json_shape() {
        let json = r#"[[{"text":"Open","type":"url","url":"https://example.com"}],
                       [{"text":"Ping","type":"callback","callback":"ping"}]]"#;
        let rows = parse_button_rows(Some(json));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].text, "Open");
        assert_eq!(rows[0][0].kind, ButtonKind::Url);
        assert_eq!(rows[1][0].callback.as_deref(), Some("ping"));
    }

    #[test]
    fn test_button_rows_absent_or_garbage() {
        assert!(parse_button_rows(None).is_empty());
        assert!(parse_button_rows(Some("")).is_empty());
        assert!(parse_button_rows(Some("not json")).is_empty());
    }
}
