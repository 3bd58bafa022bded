//! Database, settings, and media store functionality

pub mod broadcasts;
pub mod commands;
pub mod db;
pub mod media;
pub mod migrations;
pub mod settings;
pub mod types;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use media::MediaStore;
