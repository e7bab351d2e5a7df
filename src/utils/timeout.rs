//! Timeout utilities for loads that might hang
//!
//! **Default Timeouts**:
//! - Fetch: 30 seconds per module or bootstrap fetch
//! - Readiness: 30 seconds from start to the module's readiness signal
//!
//! **Configurable Timeouts**: `LoaderConfig` carries both; pass its values to
//! `with_custom_timeout()`:
//!
//! ```rust,no_run
//! # async fn demo() {
//! use modbridge::utils::with_custom_timeout;
//! use std::time::Duration;
//!
//! let result = with_custom_timeout(async { 42 }, Duration::from_secs(5)).await;
//! # }
//! ```

use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for fetching a module source or bootstrap resource
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a started module has to signal readiness
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute operation with custom timeout
pub async fn with_custom_timeout<F, T>(
    operation: F,
    duration: Duration,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    timeout(duration, operation).await
}

/// Execute operation with an optional timeout
///
/// `None` waits without bound.
pub async fn with_optional_timeout<F, T>(
    operation: F,
    duration: Option<Duration>,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    match duration {
        Some(duration) => timeout(duration, operation).await,
        None => Ok(operation.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_custom_timeout_elapses() {
        let result = with_custom_timeout(
            tokio::time::sleep(Duration::from_secs(5)),
            Duration::from_millis(10),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_optional_timeout() {
        assert_eq!(with_optional_timeout(async { 7 }, None).await.unwrap(), 7);
        assert!(with_optional_timeout(
            tokio::time::sleep(Duration::from_secs(5)),
            Some(Duration::from_millis(10)),
        )
        .await
        .is_err());
    }
}
