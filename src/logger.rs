//! Centralized logging configuration for applications embedding the triangulation factor
//!
//! The library itself only emits `tracing` events (cheirality diagnostics, workspace
//! allocation). This module installs a subscriber with a consistent format and a
//! default INFO level.

use tracing::Level;

/// Initialize the tracing subscriber with the standard configuration
///
/// Default log level: INFO (overrideable via RUST_LOG environment variable)
///
/// # Example
/// ```no_run
/// use triangulation_factor::init_logger;
///
/// init_logger();
/// tracing::info!("Application started");
/// ```
///
/// # Environment Variables
/// Override the default log level using `RUST_LOG`:
/// ```bash
/// RUST_LOG=triangulation_factor=debug cargo test
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// Only the first call installs a subscriber; later calls are no-ops.
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();

    if installed.is_err() {
        tracing::trace!("global subscriber already installed, keeping it");
    }
}
