//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod throttle;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::init_logger;
pub use throttle::Throttle;
