//! Trigger-response rules configured by administrators.
//!
//! A rule pairs a trigger (leading `/command` token or exact text) with a
//! rendered response: body, parse mode, optional media file and inline
//! keyboard. Lookups only ever see active rules; when several active rules
//! share a trigger value the most recently created one wins.

use rusqlite::{OptionalExtension, Result, Row};
use serde::Serialize;

use super::db::DbConnection;
use super::types::{MediaKind, ParseMode, TriggerKind};

/// One trigger-response rule as stored.
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub id: i64,
    pub trigger: String,
    pub trigger_kind: TriggerKind,
    pub response: String,
    pub parse_mode: ParseMode,
    pub media_kind: MediaKind,
    /// Relative path into the media store
    pub media_path: Option<String>,
    /// Raw button rows JSON
    pub buttons: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl BotCommand {
    /// True when the rule carries a stored media file.
    pub fn has_media(&self) -> bool {
        self.media_kind != MediaKind::None && self.media_path.is_some()
    }
}

/// Parameters for creating or updating a rule.
#[derive(Debug)]
pub struct CommandInput<'a> {
    pub trigger: &'a str,
    pub trigger_kind: TriggerKind,
    pub response: &'a str,
    pub parse_mode: ParseMode,
    pub media_kind: MediaKind,
    pub media_path: Option<&'a str>,
    pub buttons: Option<&'a str>,
    pub is_active: bool,
}

fn row_to_command(row: &Row<'_>) -> Result<BotCommand> {
    Ok(BotCommand {
        id: row.get(0)?,
        trigger: row.get(1)?,
        trigger_kind: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(TriggerKind::Command),
        response: row.get(3)?,
        parse_mode: row.get::<_, String>(4)?.parse().unwrap_or(ParseMode::None),
        media_kind: row.get::<_, String>(5)?.parse().unwrap_or(MediaKind::None),
        media_path: row.get(6)?,
        buttons: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const COMMAND_COLUMNS: &str =
    "id, \"trigger\", trigger_kind, response, parse_mode, media_kind, media_path, buttons, is_active, created_at, updated_at";

/// Inserts a new rule and returns its id.
pub fn create_command(conn: &DbConnection, input: &CommandInput<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO bot_commands (\"trigger\", trigger_kind, response, parse_mode, media_kind, media_path, buttons, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            input.trigger,
            input.trigger_kind.to_string(),
            input.response,
            input.parse_mode.to_string(),
            input.media_kind.to_string(),
            input.media_path,
            input.buttons,
            input.is_active,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites an existing rule. Returns true if the row existed.
pub fn update_command(conn: &DbConnection, id: i64, input: &CommandInput<'_>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE bot_commands
         SET \"trigger\" = ?1, trigger_kind = ?2, response = ?3, parse_mode = ?4,
             media_kind = ?5, media_path = ?6, buttons = ?7, is_active = ?8,
             updated_at = datetime('now')
         WHERE id = ?9",
        rusqlite::params![
            input.trigger,
            input.trigger_kind.to_string(),
            input.response,
            input.parse_mode.to_string(),
            input.media_kind.to_string(),
            input.media_path,
            input.buttons,
            input.is_active,
            id,
        ],
    )?;
    Ok(changed > 0)
}

/// Deletes a rule. Returns true if the row existed.
pub fn delete_command(conn: &DbConnection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM bot_commands WHERE id = ?1", [id])? > 0)
}

/// Flips the active flag. Returns the new state, or None if missing.
pub fn toggle_command(conn: &DbConnection, id: i64) -> Result<Option<bool>> {
    let changed = conn.execute(
        "UPDATE bot_commands SET is_active = NOT is_active, updated_at = datetime('now') WHERE id = ?1",
        [id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    conn.query_row("SELECT is_active FROM bot_commands WHERE id = ?1", [id], |row| row.get(0))
        .map(Some)
}

/// Fetches one rule by id.
pub fn get_command(conn: &DbConnection, id: i64) -> Result<Option<BotCommand>> {
    conn.query_row(
        &format!("SELECT {COMMAND_COLUMNS} FROM bot_commands WHERE id = ?1"),
        [id],
        row_to_command,
    )
    .optional()
}

/// All rules, most recently created first.
pub fn list_commands(conn: &DbConnection) -> Result<Vec<BotCommand>> {
    let mut stmt = conn.prepare(&format!("SELECT {COMMAND_COLUMNS} FROM bot_commands ORDER BY created_at DESC, id DESC"))?;
    let rows = stmt.query_map([], row_to_command)?;
    rows.collect()
}

/// Active rule matching the given trigger value and kind.
///
/// Ties between active rules sharing a trigger break toward the most
/// recently created one, so dispatch stays deterministic.
pub fn find_active_trigger(conn: &DbConnection, kind: TriggerKind, trigger: &str) -> Result<Option<BotCommand>> {
    conn.query_row(
        &format!(
            "SELECT {COMMAND_COLUMNS} FROM bot_commands
             WHERE is_active = 1 AND trigger_kind = ?1 AND \"trigger\" = ?2
             ORDER BY id DESC LIMIT 1"
        ),
        rusqlite::params![kind.to_string(), trigger],
        row_to_command,
    )
    .optional()
}

/// Total and active rule counts for the dashboard.
pub fn count_commands(conn: &DbConnection) -> Result<(i64, i64)> {
    let total = conn.query_row("SELECT COUNT(*) FROM bot_commands", [], |row| row.get(0))?;
    let active = conn.query_row("SELECT COUNT(*) FROM bot_commands WHERE is_active = 1", [], |row| {
        row.get(0)
    })?;
    Ok((total, active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_support::test_pool;

    fn plain_input<'a>(trigger: &'a str, kind: TriggerKind, response: &'a str) -> CommandInput<'a> {
        CommandInput {
            trigger,
            trigger_kind: kind,
            response,
            parse_mode: ParseMode::None,
            media_kind: MediaKind::None,
            media_path: None,
            buttons: None,
            is_active: true,
        }
    }

    #[test]
    fn test_create_and_find_by_trigger() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        create_command(&conn, &plain_input("/start", TriggerKind::Command, "Welcome!")).unwrap();

        let found = find_active_trigger(&conn, TriggerKind::Command, "/start")
            .unwrap()
            .expect("should match");
        assert_eq!(found.response, "Welcome!");

        assert!(find_active_trigger(&conn, TriggerKind::Text, "/start").unwrap().is_none());
        assert!(find_active_trigger(&conn, TriggerKind::Command, "/other").unwrap().is_none());
    }

    #[test]
    fn test_inactive_rules_never_match() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let mut input = plain_input("hello", TriggerKind::Text, "hi there");
        input.is_active = false;
        create_command(&conn, &input).unwrap();

        assert!(find_active_trigger(&conn, TriggerKind::Text, "hello").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_trigger_most_recent_wins() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        create_command(&conn, &plain_input("/help", TriggerKind::Command, "old")).unwrap();
        create_command(&conn, &plain_input("/help", TriggerKind::Command, "new")).unwrap();

        let found = find_active_trigger(&conn, TriggerKind::Command, "/help")
            .unwrap()
            .expect("should match");
        assert_eq!(found.response, "new");
    }

    #[test]
    fn test_toggle_flips_and_reports_state() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let id = create_command(&conn, &plain_input("/ping", TriggerKind::Command, "pong")).unwrap();

        assert_eq!(toggle_command(&conn, id).unwrap(), Some(false));
        assert!(find_active_trigger(&conn, TriggerKind::Command, "/ping").unwrap().is_none());
        assert_eq!(toggle_command(&conn, id).unwrap(), Some(true));
        assert_eq!(toggle_command(&conn, 9999).unwrap(), None);
    }

    #[test]
    fn test_update_and_delete() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let id = create_command(&conn, &plain_input("/a", TriggerKind::Command, "one")).unwrap();

        let mut input = plain_input("/a", TriggerKind::Command, "two");
        input.parse_mode = ParseMode::Html;
        assert!(update_command(&conn, id, &input).unwrap());

        let cmd = get_command(&conn, id).unwrap().expect("exists");
        assert_eq!(cmd.response, "two");
        assert_eq!(cmd.parse_mode, ParseMode::Html);

        assert!(delete_command(&conn, id).unwrap());
        assert!(get_command(&conn, id).unwrap().is_none());
        assert!(!delete_command(&conn, id).unwrap());
    }

    #[test]
    fn test_counts() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        create_command(&conn, &plain_input("/a", TriggerKind::Command, "x")).unwrap();
        let mut inactive = plain_input("/b", TriggerKind::Command, "y");
        inactive.is_active = false;
        create_command(&conn, &inactive).unwrap();

        assert_eq!(count_commands(&conn).unwrap(), (2, 1));
    }
}
