//! Inline keyboard rendering.
//!
//! Administrators configure buttons as ordered rows; this module turns them
//! into the provider's `inline_keyboard` structure. Invalid entries are
//! dropped rather than rejected: a button without display text disappears, a
//! URL-bound button without its URL disappears, and a row left with no valid
//! buttons is removed entirely.

use serde_json::{json, Value};

use crate::storage::types::{Button, ButtonKind, ButtonRows};

/// Renders button rows into the provider's keyboard array.
///
/// Returns `None` when nothing valid remains, so callers simply omit the
/// `reply_markup` field.
pub fn build_inline_keyboard(rows: &ButtonRows) -> Option<Value> {
    let mut keyboard = Vec::new();

    for row in rows {
        let rendered: Vec<Value> = row.iter().filter_map(render_button).collect();
        if !rendered.is_empty() {
            keyboard.push(Value::Array(rendered));
        }
    }

    if keyboard.is_empty() {
        None
    } else {
        Some(Value::Array(keyboard))
    }
}

/// Serialized `reply_markup` value for the send primitives.
pub fn reply_markup_json(rows: &ButtonRows) -> Option<String> {
    build_inline_keyboard(rows).map(|keyboard| json!({ "inline_keyboard": keyboard }).to_string())
}

fn render_button(button: &Button) -> Option<Value> {
    if button.text.is_empty() {
        return None;
    }

    match button.kind {
        ButtonKind::Url => {
            let url = button.url.as_deref().filter(|u| !u.is_empty())?;
            Some(json!({ "text": button.text, "url": url }))
        }
        ButtonKind::Miniapp => {
            let url = button.url.as_deref().filter(|u| !u.is_empty())?;
            Some(json!({ "text": button.text, "web_app": { "url": url } }))
        }
        ButtonKind::Callback => {
            // Display text doubles as callback data when none is configured
            let data = button.callback.as_deref().filter(|c| !c.is_empty()).unwrap_or(&button.text);
            Some(json!({ "text": button.text, "callback_data": data }))
        }
    }
}
