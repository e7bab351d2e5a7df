//! Error handling utilities for graceful degradation
//!
//! Provides helpers for running a preferred operation with a fallback, with
//! the fallback decision made explicit and logged.

use std::fmt;
use tracing::warn;

/// Outcome of a failed primary/fallback pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackFailure<E1, E2> {
    /// The primary failed and the failure was not eligible for fallback
    Rejected(E1),
    /// Both the primary and the fallback failed
    Exhausted { primary: E1, fallback: E2 },
}

impl<E1: fmt::Display, E2: fmt::Display> fmt::Display for FallbackFailure<E1, E2> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackFailure::Rejected(primary) => write!(f, "{}", primary),
            FallbackFailure::Exhausted { primary, fallback } => {
                write!(f, "{}; fallback also failed: {}", primary, fallback)
            }
        }
    }
}

/// Execute an async operation, falling back only for admitted errors
///
/// Returns the primary's result on success. If the primary fails and
/// `admits` accepts its error, logs a warning with `context` and runs the
/// fallback. Errors `admits` refuses are returned without running the
/// fallback.
///
/// # Example
/// ```rust,no_run
/// # async fn demo() {
/// use modbridge::utils::with_fallback_if_async;
///
/// let value: Result<u32, _> = with_fallback_if_async(
///     || async { Err::<u32, &str>("busy") },
///     |e: &&str| *e == "busy",
///     || async { Ok::<u32, &str>(1) },
///     "Primary source busy, using fallback",
/// )
/// .await;
/// # }
/// ```
pub async fn with_fallback_if_async<F1, Fut1, P, F2, Fut2, T, E1, E2>(
    primary: F1,
    admits: P,
    fallback: F2,
    context: &str,
) -> Result<T, FallbackFailure<E1, E2>>
where
    F1: FnOnce() -> Fut1,
    Fut1: std::future::Future<Output = Result<T, E1>>,
    P: FnOnce(&E1) -> bool,
    F2: FnOnce() -> Fut2,
    Fut2: std::future::Future<Output = Result<T, E2>>,
    E1: fmt::Display,
{
    match primary().await {
        Ok(value) => Ok(value),
        Err(e) if admits(&e) => {
            warn!("{}: {}", context, e);
            fallback()
                .await
                .map_err(|fallback| FallbackFailure::Exhausted {
                    primary: e,
                    fallback,
                })
        }
        Err(e) => Err(FallbackFailure::Rejected(e)),
    }
}
