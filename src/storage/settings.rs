//! Persistent key-value settings.
//!
//! Replaces in-place environment-file rewrites: the bot credential and
//! webhook URL live in the `settings` table, and updates are pushed into the
//! running API client so they take effect without a restart.

use rusqlite::{OptionalExtension, Result};

use super::db::DbConnection;

pub const BOT_TOKEN_KEY: &str = "bot_token";
pub const WEBHOOK_URL_KEY: &str = "webhook_url";

/// Reads one setting.
pub fn get_setting(conn: &DbConnection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
        .optional()
}

/// Writes one setting, overwriting any previous value.
pub fn set_setting(conn: &DbConnection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Removes one setting.
pub fn delete_setting(conn: &DbConnection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
    Ok(())
}

/// The stored bot credential, falling back to the BOT_TOKEN environment
/// variable when the table holds none.
pub fn bot_token(conn: &DbConnection) -> Result<Option<String>> {
    if let Some(token) = get_setting(conn, BOT_TOKEN_KEY)? {
        return Ok(Some(token));
    }
    let env_token = crate::core::config::BOT_TOKEN.clone();
    Ok(if env_token.is_empty() { None } else { Some(env_token) })
}

/// Masks a credential for display: first and last five characters kept,
/// everything between starred out.
pub fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    if len <= 10 {
        return "*".repeat(len);
    }
    let head: String = token.chars().take(5).collect();
    let tail: String = token.chars().skip(len - 5).collect();
    format!("{head}{}{tail}", "*".repeat(len - 10))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_support::test_pool;

    #[test]
    fn test_set_get_overwrite_delete() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        assert_eq!(get_setting(&conn, BOT_TOKEN_KEY).unwrap(), None);

        set_setting(&conn, BOT_TOKEN_KEY, "111:first").unwrap();
        set_setting(&conn, BOT_TOKEN_KEY, "222:second").unwrap();
        assert_eq!(get_setting(&conn, BOT_TOKEN_KEY).unwrap().as_deref(), Some("222:second"));

        delete_setting(&conn, BOT_TOKEN_KEY).unwrap();
        assert_eq!(get_setting(&conn, BOT_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token(""), "");
        assert_eq!(mask_token("short"), "*****");
        assert_eq!(mask_token("1234567890"), "**********");
        assert_eq!(mask_token("123456789012345"), "12345*****12345");
    }
}
