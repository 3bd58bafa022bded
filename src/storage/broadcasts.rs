//! Broadcast job records.
//!
//! A job freezes its recipient snapshot at creation; after that only the
//! dispatcher touches it, through the counter increments and the forward-only
//! status transitions below. All mutation paths are single SQL statements so
//! concurrent workers serialize on the database and cannot lose updates.

use chrono::Utc;
use rusqlite::{OptionalExtension, Result, Row};
use serde::Serialize;

use super::db::DbConnection;
use super::types::{BroadcastStatus, MediaKind, ParseMode, RecipientKind};

/// One dispatch job as stored.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastMessage {
    pub id: i64,
    pub message: String,
    pub parse_mode: ParseMode,
    pub media_kind: MediaKind,
    pub media_path: Option<String>,
    /// Raw button rows JSON
    pub buttons: Option<String>,
    pub recipient_kind: RecipientKind,
    /// Explicit row-id list when `recipient_kind` is `selected`, NULL for `all`
    pub recipient_ids: Option<String>,
    pub status: BroadcastStatus,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl BroadcastMessage {
    /// True when the job carries a stored media file.
    pub fn has_media(&self) -> bool {
        self.media_kind != MediaKind::None && self.media_path.is_some()
    }

    /// Percent of recipients processed, rounded to the nearest integer.
    pub fn progress_percentage(&self) -> i64 {
        progress_percentage(self.sent_count, self.failed_count, self.total_recipients)
    }
}

/// Percent of recipients processed, rounded to the nearest integer.
pub fn progress_percentage(sent: i64, failed: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (((sent + failed) as f64 / total as f64) * 100.0).round() as i64
}

/// Parameters for creating a job.
#[derive(Debug)]
pub struct BroadcastInput<'a> {
    pub message: &'a str,
    pub parse_mode: ParseMode,
    pub media_kind: MediaKind,
    pub media_path: Option<&'a str>,
    pub buttons: Option<&'a str>,
    pub recipient_kind: RecipientKind,
    pub recipient_ids: Option<&'a str>,
    pub total_recipients: i64,
}

/// Polling payload for the admin progress endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastProgress {
    pub status: BroadcastStatus,
    pub progress: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub total_recipients: i64,
}

/// Per-status job counts for the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

fn row_to_broadcast(row: &Row<'_>) -> Result<BroadcastMessage> {
    Ok(BroadcastMessage {
        id: row.get(0)?,
        message: row.get(1)?,
        parse_mode: row.get::<_, String>(2)?.parse().unwrap_or(ParseMode::None),
        media_kind: row.get::<_, String>(3)?.parse().unwrap_or(MediaKind::None),
        media_path: row.get(4)?,
        buttons: row.get(5)?,
        recipient_kind: row.get::<_, String>(6)?.parse().unwrap_or(RecipientKind::All),
        recipient_ids: row.get(7)?,
        status: row.get::<_, String>(8)?.parse().unwrap_or(BroadcastStatus::Pending),
        total_recipients: row.get(9)?,
        sent_count: row.get(10)?,
        failed_count: row.get(11)?,
        started_at: row.get(12)?,
        completed_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

const BROADCAST_COLUMNS: &str = "id, message, parse_mode, media_kind, media_path, buttons, recipient_kind, recipient_ids, \
     status, total_recipients, sent_count, failed_count, started_at, completed_at, created_at, updated_at";

/// Inserts a pending job with its frozen recipient count and returns its id.
pub fn create_broadcast(conn: &DbConnection, input: &BroadcastInput<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO broadcast_messages
             (message, parse_mode, media_kind, media_path, buttons, recipient_kind, recipient_ids, status, total_recipients)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
        rusqlite::params![
            input.message,
            input.parse_mode.to_string(),
            input.media_kind.to_string(),
            input.media_path,
            input.buttons,
            input.recipient_kind.to_string(),
            input.recipient_ids,
            input.total_recipients,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetches one job by id.
pub fn get_broadcast(conn: &DbConnection, id: i64) -> Result<Option<BroadcastMessage>> {
    conn.query_row(
        &format!("SELECT {BROADCAST_COLUMNS} FROM broadcast_messages WHERE id = ?1"),
        [id],
        row_to_broadcast,
    )
    .optional()
}

/// All jobs, most recent first.
pub fn list_broadcasts(conn: &DbConnection, limit: usize) -> Result<Vec<BroadcastMessage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BROADCAST_COLUMNS} FROM broadcast_messages ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map([limit as i64], row_to_broadcast)?;
    rows.collect()
}

/// Per-status counts for the admin listing.
pub fn broadcast_stats(conn: &DbConnection) -> Result<BroadcastStats> {
    let count = |status: &str| -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM broadcast_messages WHERE status = ?1",
            [status],
            |row| row.get(0),
        )
    };
    Ok(BroadcastStats {
        total: conn.query_row("SELECT COUNT(*) FROM broadcast_messages", [], |row| row.get(0))?,
        pending: count("pending")?,
        processing: count("processing")?,
        completed: count("completed")?,
        failed: count("failed")?,
    })
}

/// `pending -> processing`, stamping `started_at`. Returns true on the
/// transition, false if the job was not pending.
pub fn mark_processing(conn: &DbConnection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE broadcast_messages
         SET status = 'processing', started_at = ?1, updated_at = datetime('now')
         WHERE id = ?2 AND status = 'pending'",
        rusqlite::params![Utc::now().to_rfc3339(), id],
    )?;
    Ok(changed > 0)
}

/// `pending -> failed`, for jobs that cannot be dispatched at all.
pub fn mark_failed(conn: &DbConnection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE broadcast_messages
         SET status = 'failed', completed_at = ?1, updated_at = datetime('now')
         WHERE id = ?2 AND status = 'pending'",
        rusqlite::params![Utc::now().to_rfc3339(), id],
    )?;
    Ok(changed > 0)
}

/// Adds one delivered recipient. The counter guard keeps `sent + failed`
/// from ever exceeding the frozen total, even if a task is somehow queued
/// twice; a refused increment is a bug upstream and is reported as false.
pub fn increment_sent(conn: &DbConnection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE broadcast_messages
         SET sent_count = sent_count + 1, updated_at = datetime('now')
         WHERE id = ?1 AND sent_count + failed_count < total_recipients",
        [id],
    )?;
    Ok(changed > 0)
}

/// Adds one failed recipient, same guard as [`increment_sent`].
pub fn increment_failed(conn: &DbConnection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE broadcast_messages
         SET failed_count = failed_count + 1, updated_at = datetime('now')
         WHERE id = ?1 AND sent_count + failed_count < total_recipients",
        [id],
    )?;
    Ok(changed > 0)
}

/// `processing -> completed` once every recipient is accounted for.
///
/// The condition and the status flip are one statement, so racing workers
/// can all call this after their final increment and exactly one observes
/// the transition (returns true); the rest see no-op.
pub fn try_mark_completed(conn: &DbConnection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE broadcast_messages
         SET status = 'completed', completed_at = ?1, updated_at = datetime('now')
         WHERE id = ?2 AND status = 'processing'
           AND sent_count + failed_count >= total_recipients",
        rusqlite::params![Utc::now().to_rfc3339(), id],
    )?;
    Ok(changed > 0)
}

/// Jobs left `processing` by an earlier run. Logged at startup; resuming
/// them is intentionally not attempted.
pub fn stuck_processing_ids(conn: &DbConnection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM broadcast_messages WHERE status = 'processing'")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Current counters for the polling endpoint.
pub fn get_progress(conn: &DbConnection, id: i64) -> Result<Option<BroadcastProgress>> {
    conn.query_row(
        "SELECT status, sent_count, failed_count, total_recipients FROM broadcast_messages WHERE id = ?1",
        [id],
        |row| {
            let sent: i64 = row.get(1)?;
            let failed: i64 = row.get(2)?;
            let total: i64 = row.get(3)?;
            Ok(BroadcastProgress {
                status: row.get::<_, String>(0)?.parse().unwrap_or(BroadcastStatus::Pending),
                progress: progress_percentage(sent, failed, total),
                sent_count: sent,
                failed_count: failed,
                total_recipients: total,
            })
        },
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_support::test_pool;
    use pretty_assertions::assert_eq;

    fn job<'a>(total: i64) -> BroadcastInput<'a> {
        BroadcastInput {
            message: "hello everyone",
            parse_mode: ParseMode::None,
            media_kind: MediaKind::None,
            media_path: None,
            buttons: None,
            recipient_kind: RecipientKind::All,
            recipient_ids: None,
            total_recipients: total,
        }
    }

    #[test]
    fn test_progress_percentage_rounding() {
        assert_eq!(progress_percentage(150, 10, 200), 80);
        assert_eq!(progress_percentage(0, 0, 200), 0);
        assert_eq!(progress_percentage(200, 0, 200), 100);
        assert_eq!(progress_percentage(1, 0, 3), 33);
        assert_eq!(progress_percentage(2, 0, 3), 67);
        assert_eq!(progress_percentage(0, 0, 0), 0);
    }

    #[test]
    fn test_status_only_moves_forward() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let id = create_broadcast(&conn, &job(2)).unwrap();
        assert!(mark_processing(&conn, id).unwrap());
        assert!(!mark_processing(&conn, id).unwrap(), "no repeat transition");
        assert!(!mark_failed(&conn, id).unwrap(), "no processing -> failed");

        let row = get_broadcast(&conn, id).unwrap().unwrap();
        assert_eq!(row.status, BroadcastStatus::Processing);
        assert!(row.started_at.is_some());
    }

    #[test]
    fn test_completion_requires_full_counters_and_fires_once() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let id = create_broadcast(&conn, &job(2)).unwrap();
        mark_processing(&conn, id).unwrap();

        assert!(increment_sent(&conn, id).unwrap());
        assert!(!try_mark_completed(&conn, id).unwrap(), "1 of 2 processed");

        assert!(increment_failed(&conn, id).unwrap());
        assert!(try_mark_completed(&conn, id).unwrap());
        assert!(!try_mark_completed(&conn, id).unwrap(), "completion is sticky");

        let row = get_broadcast(&conn, id).unwrap().unwrap();
        assert_eq!(row.status, BroadcastStatus::Completed);
        assert_eq!(row.sent_count + row.failed_count, row.total_recipients);
        assert!(row.completed_at.is_some());
    }

    #[test]
    fn test_counters_never_exceed_total() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let id = create_broadcast(&conn, &job(1)).unwrap();
        mark_processing(&conn, id).unwrap();

        assert!(increment_sent(&conn, id).unwrap());
        assert!(!increment_sent(&conn, id).unwrap(), "guard refuses overflow");
        assert!(!increment_failed(&conn, id).unwrap());

        let row = get_broadcast(&conn, id).unwrap().unwrap();
        assert_eq!(row.sent_count, 1);
        assert_eq!(row.failed_count, 0);
    }

    #[test]
    fn test_empty_job_fails_instead_of_processing() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let id = create_broadcast(&conn, &job(0)).unwrap();
        assert!(mark_failed(&conn, id).unwrap());

        let row = get_broadcast(&conn, id).unwrap().unwrap();
        assert_eq!(row.status, BroadcastStatus::Failed);
        assert!(!mark_processing(&conn, id).unwrap(), "failed is terminal");
    }

    #[test]
    fn test_stats_and_progress_endpoint_shape() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let a = create_broadcast(&conn, &job(200)).unwrap();
        mark_processing(&conn, a).unwrap();
        for _ in 0..150 {
            increment_sent(&conn, a).unwrap();
        }
        for _ in 0..10 {
            increment_failed(&conn, a).unwrap();
        }

        let progress = get_progress(&conn, a).unwrap().unwrap();
        assert_eq!(progress.progress, 80);
        assert_eq!(progress.sent_count, 150);
        assert_eq!(progress.failed_count, 10);
        assert_eq!(progress.status, BroadcastStatus::Processing);

        let stats = broadcast_stats(&conn).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.processing, 1);
    }
}
