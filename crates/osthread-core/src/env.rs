//! Environment variable helpers
//!
//! Used by `PoolConfig::from_env()` to layer `OSTHREAD_*` overrides on top of
//! library defaults. Unset or unparsable values fall back to the default.

use std::str::FromStr;

/// Read `key` parsed as `T`, or return `default`
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Read `key` as `T` if set and parsable
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Read `key` as a boolean
///
/// "1", "true", "yes", "on" (any case) are true; any other set value is
/// false; unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Read `key` as a string, or return `default`
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__OSTHREAD_TEST_UNSET__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_env_get_set_value() {
        std::env::set_var("__OSTHREAD_TEST_NUM__", " 7 ");
        let val: usize = env_get("__OSTHREAD_TEST_NUM__", 0);
        assert_eq!(val, 7);
        std::env::remove_var("__OSTHREAD_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__OSTHREAD_TEST_BAD__", "seven");
        let val: usize = env_get("__OSTHREAD_TEST_BAD__", 99);
        assert_eq!(val, 99);
        assert!(env_get_opt::<usize>("__OSTHREAD_TEST_BAD__").is_none());
        std::env::remove_var("__OSTHREAD_TEST_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        assert!(env_get_bool("__OSTHREAD_TEST_UNSET__", true));

        for yes in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var("__OSTHREAD_TEST_BOOL__", yes);
            assert!(env_get_bool("__OSTHREAD_TEST_BOOL__", false), "{yes}");
        }
        for no in ["0", "false", "off", "garbage"] {
            std::env::set_var("__OSTHREAD_TEST_BOOL__", no);
            assert!(!env_get_bool("__OSTHREAD_TEST_BOOL__", true), "{no}");
        }
        std::env::remove_var("__OSTHREAD_TEST_BOOL__");
    }

    #[test]
    fn test_env_get_str_default() {
        assert_eq!(env_get_str("__OSTHREAD_TEST_UNSET__", "pool"), "pool");
    }
}
