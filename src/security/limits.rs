//! Request and connection limits.
//!
//! # Responsibilities
//! - Describe the server-wide resource limits attached to routes
//! - Enforce maximum request body size
//! - Enforce maximum URI length
//!
//! # Design Decisions
//! - Limits are plain values; every route carries its own copy
//! - The default host's "default" route receives the server-wide limits
//! - Return 413 Payload Too Large or 414 URI Too Long

use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Resource limits applied to requests served by a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Maximum length of the request URI (path and query).
    pub max_uri_length: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            max_uri_length: 8 * 1024,
            request_timeout_secs: 30,
        }
    }
}

impl Limits {
    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check a request URI against the length limit.
    pub fn check_uri(&self, uri: &str) -> Result<(), StatusCode> {
        if uri.len() > self.max_uri_length {
            return Err(StatusCode::URI_TOO_LONG);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_limit() {
        let limits = Limits {
            max_uri_length: 8,
            ..Limits::default()
        };
        assert!(limits.check_uri("/short").is_ok());
        assert_eq!(limits.check_uri("/much/too/long"), Err(StatusCode::URI_TOO_LONG));
    }

    #[test]
    fn test_defaults_from_partial_toml() {
        let limits: Limits = toml::from_str("max_body_size = 10").unwrap();
        assert_eq!(limits.max_body_size, 10);
        assert_eq!(limits.request_timeout(), Duration::from_secs(30));
    }
}
