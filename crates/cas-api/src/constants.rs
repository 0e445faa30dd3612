//! API constants

/// API base path prefix
pub const API_PREFIX: &str = "/api";

/// Failed logins allowed per client IP within [`LOGIN_FAILURE_WINDOW_SECS`]
pub const LOGIN_MAX_FAILURES: u32 = 10;
pub const LOGIN_FAILURE_WINDOW_SECS: u64 = 900;

/// Proxies in front of the API whose `X-Forwarded-For` entries are trusted
pub const DEFAULT_TRUSTED_PROXY_COUNT: usize = 1;
