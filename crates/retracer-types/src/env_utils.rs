//! Environment variable parsing utilities.
//!
//! Type-safe helpers for reading configuration overrides, eliminating the
//! repeated `std::env::var(..).ok().and_then(|v| v.parse().ok())` boilerplate.
//!
//! # Example
//!
//! ```
//! use retracer_types::env_utils::{env_var_or, env_bool};
//!
//! let timeout: u64 = env_var_or("RETRACER_HTTP_TIMEOUT_MS", 15_000);
//! let debug_enabled = env_bool("RETRACER_DEBUG_PROVIDER");
//! ```

use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parse an environment variable with a default value.
///
/// Returns the default if the variable is not set or cannot be parsed.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Check if an environment variable is set to a truthy value.
///
/// Returns `true` if the variable is "1", "true", "yes", or "on"
/// (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get an environment variable as a string with a default value.
pub fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
