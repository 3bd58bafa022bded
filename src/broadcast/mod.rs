//! Broadcast dispatch: per-recipient task queue and worker pool

pub mod dispatcher;
pub mod queue;

// Re-exports for convenience
pub use dispatcher::{process_queue, start, BroadcastDraft, Dispatcher};
pub use queue::{BroadcastQueue, SendTask};
