//! Broadcast dispatcher: delivers a job to every recipient in its frozen
//! snapshot under the shared rate ceiling, keeping the counters and the job
//! state machine correct regardless of worker interleaving.
//!
//! Each recipient is one independent unit of work. A worker passes through
//! the shared [`Throttle`] before its network call, spends a small retry
//! budget on transient transport failures, then increments exactly one of
//! the job's counters and attempts the completion transition. One
//! recipient's failure never touches another recipient or the batch.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::interval;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::retry::{retry, Retryable, RetryConfig};
use crate::core::throttle::Throttle;
use crate::storage::broadcasts::{
    self, create_broadcast, get_broadcast, BroadcastInput, BroadcastMessage,
};
use crate::storage::db::DbPool;
use crate::storage::types::{parse_button_rows, MediaKind, ParseMode, RecipientKind};
use crate::storage::users::{active_chat_ids, chat_ids_for_selection};
use crate::storage::{get_connection, MediaStore};
use crate::telegram::api::{ApiClient, SendOptions};
use crate::telegram::keyboard::reply_markup_json;

use super::queue::{BroadcastQueue, SendTask};

/// Everything a worker needs; cheap to clone per spawned task.
#[derive(Clone)]
pub struct Dispatcher {
    pub db: Arc<DbPool>,
    pub api: Arc<ApiClient>,
    pub media: Arc<MediaStore>,
    pub queue: Arc<BroadcastQueue>,
    pub throttle: Throttle,
}

/// Admin-supplied job definition, validated before anything is persisted.
#[derive(Debug)]
pub struct BroadcastDraft {
    pub message: String,
    pub parse_mode: ParseMode,
    pub media_kind: MediaKind,
    pub media_path: Option<String>,
    /// Raw button rows JSON
    pub buttons: Option<String>,
    pub recipient_kind: RecipientKind,
    /// Directory row ids when `recipient_kind` is `selected`
    pub recipient_ids: Vec<i64>,
}

impl Dispatcher {
    pub fn new(db: Arc<DbPool>, api: Arc<ApiClient>, media: Arc<MediaStore>) -> Self {
        Self {
            db,
            api,
            media,
            queue: Arc::new(BroadcastQueue::new()),
            throttle: Throttle::new(config::dispatch::send_interval()),
        }
    }

    /// Creates a job from a draft and hands its recipients to the workers.
    ///
    /// The recipient set is resolved exactly once, here; the job owns that
    /// snapshot and later directory changes cannot disturb its accounting.
    /// An empty resolution creates the job in the `failed` terminal state
    /// with zero attempted sends.
    pub async fn submit(&self, draft: &BroadcastDraft) -> AppResult<i64> {
        if draft.message.trim().is_empty() {
            return Err(AppError::Validation("Broadcast message must not be empty".into()));
        }
        if draft.recipient_kind == RecipientKind::Selected && draft.recipient_ids.is_empty() {
            return Err(AppError::Validation("No recipients selected".into()));
        }

        let conn = get_connection(&self.db)?;

        let mut chat_ids = match draft.recipient_kind {
            RecipientKind::All => active_chat_ids(&conn)?,
            RecipientKind::Selected => chat_ids_for_selection(&conn, &draft.recipient_ids)?,
        };
        // A duplicated selection must not double-count a recipient
        chat_ids.sort_unstable();
        chat_ids.dedup();

        let recipient_ids_json = match draft.recipient_kind {
            RecipientKind::All => None,
            RecipientKind::Selected => Some(serde_json::to_string(&draft.recipient_ids)?),
        };

        let id = create_broadcast(
            &conn,
            &BroadcastInput {
                message: &draft.message,
                parse_mode: draft.parse_mode,
                media_kind: draft.media_kind,
                media_path: draft.media_path.as_deref(),
                buttons: draft.buttons.as_deref(),
                recipient_kind: draft.recipient_kind,
                recipient_ids: recipient_ids_json.as_deref(),
                total_recipients: chat_ids.len() as i64,
            },
        )?;

        if chat_ids.is_empty() {
            broadcasts::mark_failed(&conn, id)?;
            log::warn!("Broadcast {} resolved zero recipients, marked failed", id);
            return Ok(id);
        }

        broadcasts::mark_processing(&conn, id)?;
        drop(conn);

        self.queue.enqueue_job(id, &chat_ids).await;
        log::info!("Broadcast {} submitted to {} recipient(s)", id, chat_ids.len());

        Ok(id)
    }

    /// Logs jobs a previous process left mid-flight. They are not resumed.
    pub fn report_stuck_jobs(&self) -> AppResult<()> {
        let conn = get_connection(&self.db)?;
        let stuck = broadcasts::stuck_processing_ids(&conn)?;
        for id in stuck {
            log::warn!("Broadcast {} was left processing by an earlier run and will not resume", id);
        }
        Ok(())
    }
}

/// Worker-pool loop. Polls the queue, spawns one bounded task per recipient;
/// concurrency is capped by the semaphore and aggregate throughput by the
/// shared throttle each worker passes through.
pub async fn process_queue(dispatcher: Dispatcher) {
    let semaphore = Arc::new(Semaphore::new(config::dispatch::MAX_CONCURRENT_SENDS));
    let mut tick = interval(config::dispatch::check_interval());

    loop {
        tick.tick().await;

        loop {
            let permit = match Arc::clone(&semaphore).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break, // pool saturated, try again next tick
            };
            let Some(task) = dispatcher.queue.get_task().await else {
                break; // permit dropped with this scope
            };

            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let _permit = permit;
                dispatcher.throttle.acquire().await;
                run_send_task(&dispatcher, &task).await;
            });
        }
    }
}

/// Spawns the dispatcher loop onto the runtime.
pub fn start(dispatcher: Dispatcher) -> tokio::task::JoinHandle<()> {
    tokio::spawn(process_queue(dispatcher))
}

/// Failure of one send attempt. Transient transport conditions are worth a
/// bounded retry; provider-side rejections ("bot was blocked by the user",
/// "chat not found") and a missing credential are final on first sight.
#[derive(Debug)]
struct SendError {
    description: String,
}

impl SendError {
    fn is_transient(description: &str) -> bool {
        let lower = description.to_lowercase();
        lower.contains("too many requests")
            || lower.contains("bad gateway")
            || lower.contains("service unavailable")
            || lower.contains("gateway timeout")
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection")
            || lower.contains("network")
            || lower.contains("error sending request")
    }
}

impl Retryable for SendError {
    fn is_retryable(&self) -> bool {
        SendError::is_transient(&self.description)
    }
}

/// Executes one unit of work: render, send with retry budget, record
/// exactly one counter, attempt the completion transition.
async fn run_send_task(dispatcher: &Dispatcher, task: &SendTask) {
    let outcome = attempt_send(dispatcher, task).await;

    match &outcome {
        Ok(()) => {}
        Err(e) => {
            log::warn!(
                "Broadcast {} send to chat {} failed: {}",
                task.broadcast_id,
                task.chat_id,
                e
            );
        }
    }

    if let Err(e) = record_outcome(dispatcher, task, outcome.is_ok()) {
        // Counter bookkeeping failures are the one thing that can skew the
        // job's accounting; they must be loud.
        log::error!(
            "Failed to record outcome for broadcast {} chat {}: {}",
            task.broadcast_id,
            task.chat_id,
            e
        );
    }
}

async fn attempt_send(dispatcher: &Dispatcher, task: &SendTask) -> Result<(), String> {
    let broadcast = {
        let conn = get_connection(&dispatcher.db).map_err(|e| e.to_string())?;
        get_broadcast(&conn, task.broadcast_id).map_err(|e| e.to_string())?
    };
    let Some(broadcast) = broadcast else {
        return Err(format!("broadcast {} no longer exists", task.broadcast_id));
    };

    let retry_config = RetryConfig::new();
    let result = retry(&retry_config, || send_once(dispatcher, &broadcast, task.chat_id)).await;

    result.map_err(|e| match e {
        crate::core::retry::RetryError::Exhausted { last_error, .. } => last_error.description,
    })
}

/// One provider call for one recipient. Broadcast text carries no
/// per-recipient placeholders; rendering is resolving parse mode, keyboard
/// and the send primitive for the media kind.
async fn send_once(dispatcher: &Dispatcher, broadcast: &BroadcastMessage, chat_id: i64) -> Result<(), SendError> {
    let rows = parse_button_rows(broadcast.buttons.as_deref());
    let options = SendOptions {
        parse_mode: broadcast.parse_mode,
        reply_markup: reply_markup_json(&rows),
    };

    let response = if broadcast.has_media() {
        let relative = broadcast.media_path.as_deref().unwrap_or_default();
        match dispatcher.media.full_path(relative) {
            Ok(path) => {
                dispatcher
                    .api
                    .send_media(broadcast.media_kind, chat_id, &path, Some(&broadcast.message), &options)
                    .await
            }
            Err(e) => {
                return Err(SendError {
                    description: e.to_string(),
                })
            }
        }
    } else {
        dispatcher.api.send_text(chat_id, &broadcast.message, &options).await
    };

    if response.ok {
        Ok(())
    } else {
        Err(SendError {
            description: response.description().to_string(),
        })
    }
}

/// Increments exactly one counter for the recipient, then flips the job to
/// `completed` the first time the counters reach the frozen total. The
/// conditional UPDATE underneath makes the completion check safe to run
/// from any number of concurrent workers.
fn record_outcome(dispatcher: &Dispatcher, task: &SendTask, sent: bool) -> AppResult<()> {
    let conn = get_connection(&dispatcher.db)?;

    let counted = if sent {
        broadcasts::increment_sent(&conn, task.broadcast_id)?
    } else {
        broadcasts::increment_failed(&conn, task.broadcast_id)?
    };
    if !counted {
        log::error!(
            "Counter increment refused for broadcast {} (chat {}): counters already at total",
            task.broadcast_id,
            task.chat_id
        );
    }

    if broadcasts::try_mark_completed(&conn, task.broadcast_id)? {
        log::info!("Broadcast {} completed", task.broadcast_id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        for transient in [
            "Too Many Requests: retry after 5",
            "Bad Gateway",
            "error sending request for url",
            "operation timed out",
            "connection reset by peer",
        ] {
            assert!(SendError::is_transient(transient), "{transient}");
        }

        for terminal in [
            "Forbidden: bot was blocked by the user",
            "Bad Request: chat not found",
            "Bot token is not configured",
        ] {
            assert!(!SendError::is_transient(terminal), "{terminal}");
        }
    }
}
