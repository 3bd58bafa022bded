//! Inbound wire types for provider webhook updates.
//!
//! Deliberately lenient: only the fields this service routes on are
//! declared, everything else is ignored, and almost everything is optional
//! so a surprising payload degrades to "not a user message" instead of a
//! parse failure.

use serde::Deserialize;

/// One webhook update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

/// A user message inside an update.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub message_id: Option<i64>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<Sender>,
}

/// The chat a message arrived in.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// The sending user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}
