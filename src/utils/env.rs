//! Environment variable utilities
//!
//! Provides helpers for reading environment variable overrides.

/// Get environment variable as Option
///
/// Returns `Some(value)` if set and not blank, `None` otherwise.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get environment variable as integer
///
/// Returns `Some(value)` if set and parseable, `None` otherwise.
pub fn env_int<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env_opt(key)?.trim().parse().ok()
}
