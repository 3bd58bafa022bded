//! Logging initialization
//!
//! Code throughout the crate logs via the `log` macros; `tracing-log`
//! forwards those records into the `tracing` subscriber so everything ends
//! up in one formatted stream. The filter defaults to `info` and can be
//! overridden with RUST_LOG.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber (console output).
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - A global logger was already installed
pub fn init_logger() -> Result<()> {
    tracing_log::LogTracer::init().map_err(|e| anyhow::anyhow!("Failed to install log bridge: {}", e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}
