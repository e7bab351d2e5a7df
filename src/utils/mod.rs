//! Utility modules for fault tolerance and observability

pub mod env;
pub mod error;
pub mod logging;
pub mod timeout;

// Re-export commonly used items
pub use env::{env_int, env_opt};
pub use error::{with_fallback_if_async, FallbackFailure};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config};
pub use timeout::{
    with_custom_timeout, with_optional_timeout, DEFAULT_FETCH_TIMEOUT, DEFAULT_READINESS_TIMEOUT,
};
