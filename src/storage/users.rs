//! User directory synchronized from inbound Telegram updates.
//!
//! One row per provider identity (`telegram_id` is UNIQUE). Rows are created
//! on first contact and refreshed on every subsequent message; the blocked
//! flag belongs to administrators only and is never touched by the upsert.

use chrono::Utc;
use rusqlite::{OptionalExtension, Result, Row};
use serde::Serialize;

use super::db::DbConnection;

/// One directory entry as stored.
#[derive(Debug, Clone, Serialize)]
pub struct TelegramUser {
    pub id: i64,
    pub telegram_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub is_bot: bool,
    pub is_blocked: bool,
    pub last_activity_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TelegramUser {
    /// Display name assembled from the name fields.
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// Profile fields carried by an inbound update's `from` object.
#[derive(Debug, Default)]
pub struct UserProfile<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub username: Option<&'a str>,
    pub language_code: Option<&'a str>,
    pub is_bot: bool,
}

/// Status filter for directory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Any,
    Active,
    Blocked,
}

fn row_to_user(row: &Row<'_>) -> Result<TelegramUser> {
    Ok(TelegramUser {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        username: row.get(4)?,
        language_code: row.get(5)?,
        is_bot: row.get(6)?,
        is_blocked: row.get(7)?,
        last_activity_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const USER_COLUMNS: &str =
    "id, telegram_id, first_name, last_name, username, language_code, is_bot, is_blocked, last_activity_at, created_at, updated_at";

/// Creates or refreshes the row for a provider identity and returns it.
///
/// Keyed on `telegram_id`; name, username, language code, bot flag and the
/// activity timestamp are overwritten on every call, so repeated upserts for
/// the same identity never create a second row.
pub fn upsert_user(conn: &DbConnection, telegram_id: i64, profile: &UserProfile<'_>) -> Result<TelegramUser> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO telegram_users (telegram_id, first_name, last_name, username, language_code, is_bot, last_activity_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(telegram_id) DO UPDATE SET
             first_name = excluded.first_name,
             last_name = excluded.last_name,
             username = excluded.username,
             language_code = excluded.language_code,
             is_bot = excluded.is_bot,
             last_activity_at = excluded.last_activity_at,
             updated_at = datetime('now')",
        rusqlite::params![
            telegram_id,
            profile.first_name,
            profile.last_name,
            profile.username,
            profile.language_code,
            profile.is_bot,
            now,
        ],
    )?;

    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM telegram_users WHERE telegram_id = ?1"),
        [telegram_id],
        row_to_user,
    )
}

/// Fetches a user by row id.
pub fn get_user(conn: &DbConnection, id: i64) -> Result<Option<TelegramUser>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM telegram_users WHERE id = ?1"),
        [id],
        row_to_user,
    )
    .optional()
}

/// Fetches a user by provider identity.
pub fn get_user_by_telegram_id(conn: &DbConnection, telegram_id: i64) -> Result<Option<TelegramUser>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM telegram_users WHERE telegram_id = ?1"),
        [telegram_id],
        row_to_user,
    )
    .optional()
}

/// Directory listing with optional search and status filter, most recently
/// active first. Search matches name, username, or the numeric identity.
pub fn search_users(
    conn: &DbConnection,
    search: Option<&str>,
    status: StatusFilter,
    limit: usize,
) -> Result<Vec<TelegramUser>> {
    let pattern = search.map(|s| format!("%{s}%"));
    let status_clause = match status {
        StatusFilter::Any => "",
        StatusFilter::Active => " AND is_blocked = 0",
        StatusFilter::Blocked => " AND is_blocked = 1",
    };
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM telegram_users
         WHERE (?1 IS NULL
                OR first_name LIKE ?1 OR last_name LIKE ?1
                OR username LIKE ?1 OR CAST(telegram_id AS TEXT) LIKE ?1){status_clause}
         ORDER BY last_activity_at DESC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![pattern, limit as i64], row_to_user)?;
    rows.collect()
}

/// Chat ids of every unblocked user, the `all` recipient snapshot.
pub fn active_chat_ids(conn: &DbConnection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT telegram_id FROM telegram_users WHERE is_blocked = 0")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Chat ids for an explicit row-id selection, silently dropping blocked or
/// missing entries so blocked users never receive broadcast traffic.
pub fn chat_ids_for_selection(conn: &DbConnection, ids: &[i64]) -> Result<Vec<i64>> {
    let mut chat_ids = Vec::with_capacity(ids.len());
    let mut stmt = conn.prepare("SELECT telegram_id FROM telegram_users WHERE id = ?1 AND is_blocked = 0")?;
    for id in ids {
        if let Some(chat_id) = stmt.query_row([id], |row| row.get::<_, i64>(0)).optional()? {
            chat_ids.push(chat_id);
        }
    }
    Ok(chat_ids)
}

/// Sets the blocked flag. Returns true if the row existed.
pub fn set_blocked(conn: &DbConnection, id: i64, blocked: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE telegram_users SET is_blocked = ?1, updated_at = datetime('now') WHERE id = ?2",
        rusqlite::params![blocked, id],
    )?;
    Ok(changed > 0)
}

/// Flips the blocked flag. Returns the new state, or None if missing.
pub fn toggle_blocked(conn: &DbConnection, id: i64) -> Result<Option<bool>> {
    let changed = conn.execute(
        "UPDATE telegram_users SET is_blocked = NOT is_blocked, updated_at = datetime('now') WHERE id = ?1",
        [id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    conn.query_row("SELECT is_blocked FROM telegram_users WHERE id = ?1", [id], |row| row.get(0))
        .map(Some)
}

/// Updates admin-editable profile fields. Returns true if the row existed.
pub fn rename_user(
    conn: &DbConnection,
    id: i64,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE telegram_users
         SET first_name = COALESCE(?1, first_name),
             last_name = COALESCE(?2, last_name),
             updated_at = datetime('now')
         WHERE id = ?3",
        rusqlite::params![first_name, last_name, id],
    )?;
    Ok(changed > 0)
}

/// Removes a user from the directory. Returns true if the row existed.
pub fn delete_user(conn: &DbConnection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM telegram_users WHERE id = ?1", [id])? > 0)
}

/// Total / active / blocked counts for the dashboard.
pub fn count_users(conn: &DbConnection) -> Result<(i64, i64, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM telegram_users", [], |row| row.get(0))?;
    let blocked: i64 = conn.query_row("SELECT COUNT(*) FROM telegram_users WHERE is_blocked = 1", [], |row| {
        row.get(0)
    })?;
    Ok((total, total - blocked, blocked))
}
