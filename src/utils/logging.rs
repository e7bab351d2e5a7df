//! Logging initialization
//!
//! Simple `tracing-subscriber` setup shared by binaries and tests that embed
//! the loader:
//! - Respects the RUST_LOG environment variable
//! - Falls back to a configured filter, then to "info"
//! - Module log lines arrive under the `modbridge::guest` target
//!
//! # Usage
//! ```rust,no_run
//! use modbridge::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Pick the effective filter: RUST_LOG wins, then `filter`, then "info"
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize human-readable logging
///
/// Returns `false` if a global subscriber was already installed (for example
/// by another test), in which case nothing changes.
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "debug",
///   "modbridge=debug,modbridge::guest=trace"). RUST_LOG takes precedence.
pub fn init_logging(filter: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true) // Guest lines are distinguished by target
                .with_thread_names(true) // Module threads are named after the module
                .with_ansi(std::env::var("NO_COLOR").is_err()), // Respect NO_COLOR standard
        )
        .with(build_filter(filter))
        .try_init()
        .is_ok()
}

/// Initialize logging with JSON output (for production/monitoring)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true) // Carries the load id
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .try_init()
        .is_ok()
}

/// Initialize logging from [`LoggingConfig`]
///
/// JSON output needs the `json-logging` feature; without it the JSON flag
/// falls back to human-readable output.
pub fn init_logging_from_config(config: Option<&LoggingConfig>) -> bool {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            return init_json_logging(filter);
        }
    }
    init_logging(filter)
}
