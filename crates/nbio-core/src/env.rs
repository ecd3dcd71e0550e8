//! Environment variable utilities
//!
//! Generic `env_get<T>` function for parsing environment variables with defaults.
//! Used by [`crate::diag`] to read log level/verbosity knobs, and by the
//! `echo-pool` demo for its worker/contention knobs, without pulling in a
//! configuration crate for a handful of variables. Trimmed to the two
//! functions this tree actually calls — `env_is_set` had no caller here and
//! is dropped rather than carried as unused surface.

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean.
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Everything else (including unset) returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_on_unset() {
        let val: usize = env_get("__NBIO_TEST_UNSET__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn bool_variants() {
        std::env::set_var("__NBIO_TEST_BOOL__", "YES");
        assert!(env_get_bool("__NBIO_TEST_BOOL__", false));
        std::env::set_var("__NBIO_TEST_BOOL__", "0");
        assert!(!env_get_bool("__NBIO_TEST_BOOL__", true));
        std::env::remove_var("__NBIO_TEST_BOOL__");
    }

    #[test]
    fn invalid_parse_falls_back() {
        std::env::set_var("__NBIO_TEST_INVALID__", "not_a_number");
        let val: usize = env_get("__NBIO_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__NBIO_TEST_INVALID__");
    }
}
