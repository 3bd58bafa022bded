//! Per-recipient task queue for broadcast jobs.
//!
//! Submitting a job turns its frozen recipient snapshot into one
//! [`SendTask`] per chat. Workers drain the queue concurrently; ordering
//! between recipients carries no meaning, only the aggregate counters do.

use std::collections::VecDeque;
use tokio::sync::Mutex;

/// One unit of work: deliver one broadcast to one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTask {
    pub broadcast_id: i64,
    pub chat_id: i64,
}

/// Thread-safe FIFO of pending send tasks, shared between the submitting
/// admin handler and the dispatcher workers.
pub struct BroadcastQueue {
    queue: Mutex<VecDeque<SendTask>>,
}

impl Default for BroadcastQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues one task per chat id for a job.
    pub async fn enqueue_job(&self, broadcast_id: i64, chat_ids: &[i64]) {
        let mut queue = self.queue.lock().await;
        queue.reserve(chat_ids.len());
        for &chat_id in chat_ids {
            queue.push_back(SendTask { broadcast_id, chat_id });
        }
        log::info!(
            "Enqueued {} send task(s) for broadcast {} (queue depth: {})",
            chat_ids.len(),
            broadcast_id,
            queue.len()
        );
    }

    /// Pops the next task, or `None` when the queue is drained.
    pub async fn get_task(&self) -> Option<SendTask> {
        self.queue.lock().await.pop_front()
    }

    /// Current number of pending tasks.
    pub async fn size(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Pending tasks belonging to one job.
    pub async fn pending_for(&self, broadcast_id: i64) -> usize {
        self.queue
            .lock()
            .await
            .iter()
            .filter(|task| task.broadcast_id == broadcast_id)
            .count()
    }
}
