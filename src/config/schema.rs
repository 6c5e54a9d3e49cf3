//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::observability::tracing::RouteTrace;
use crate::security::Limits;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening endpoints.
    pub listener: ListenerConfig,

    /// Server-wide request limits, given to the default route.
    pub limits: Limits,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    /// Hosts and virtual hosts, with their routes.
    pub hosts: Vec<HostConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional second address whose requests are marked secure. TLS is
    /// terminated in front of the server.
    pub secure_address: Option<String>,

    /// Maximum concurrent requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            secure_address: None,
            max_connections: 10_000,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on how long any response stays cached.
    pub max_duration_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 86_400,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// Bearer token required on every admin request.
    pub api_key: String,

    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// A host or virtual host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Name matched against the request's host identity.
    pub name: Option<String>,

    /// Name of the host this one is a virtual host of.
    pub parent: Option<String>,

    /// Serve requests no other host claims.
    pub default: bool,

    pub ip: Option<String>,
    pub port: Option<u16>,

    /// Enable per-route request tracing on this host. Virtual hosts inherit
    /// their parent's setting when unset.
    pub trace: Option<bool>,

    /// Start from an empty table instead of the parent's routes.
    pub reset_routes: bool,

    pub routes: Vec<RouteConfig>,

    pub streaming: Vec<StreamingConfig>,
}

/// A route definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteConfig {
    pub name: String,

    /// Anchored pattern; `""`, `"/"`, `"^/"` and `"^/$"` all mean "every path".
    pub pattern: String,

    /// `run <args>`, `redirect <status> <location>` or `write <status> <body>`.
    pub target: String,

    /// Allowed methods; empty means any.
    pub methods: Vec<String>,

    /// Stage processing every request on this route.
    pub handler: Option<String>,

    /// Stages offered the request in order, when no handler is set.
    pub handlers: Vec<String>,

    /// Extension (without dot) to stage name.
    pub extensions: BTreeMap<String, String>,

    /// Authentication type name.
    pub auth: Option<String>,

    pub home: Option<String>,
    pub documents: Option<String>,
    pub source: Option<String>,
    pub template: Option<String>,
    pub indexes: Vec<String>,

    /// `host <name>`, `header <name> <value>` or `secure`.
    pub conditions: Vec<String>,

    pub trace: Option<RouteTrace>,

    /// Route (on the same host) to inherit handlers, auth and limits from.
    pub parent: Option<String>,

    /// Leave the route out of route dumps.
    pub hidden: bool,

    /// Part of a route set; children do not inherit its trace.
    pub grouped: bool,

    /// Cache successful responses for this long.
    pub cache_lifespan_secs: Option<u64>,

    /// Overrides the server limits for this route.
    pub limits: Option<Limits>,
}

/// A streaming rule for one mime type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    pub mime: String,

    /// Restrict the rule to URIs starting with this prefix.
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.cache.max_duration_secs, 86_400);
        assert!(config.hosts.is_empty());
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_host_tables() {
        let toml = r#"
            [[hosts]]
            name = "example.com"
            default = true

            [[hosts.routes]]
            name = "api"
            pattern = "^/api/(.*)"
            handler = "actionHandler"
            methods = ["GET", "POST"]
            extensions = { json = "passHandler" }
            trace = { level = "debug" }

            [[hosts.streaming]]
            mime = "text/html"
            enabled = false
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        let host = &config.hosts[0];
        assert!(host.default);
        assert_eq!(host.routes[0].methods, vec!["GET", "POST"]);
        assert_eq!(host.routes[0].extensions["json"], "passHandler");
        assert!(host.routes[0].trace.is_some());
        assert!(!host.streaming[0].enabled);
        assert!(host.streaming[0].uri.is_none());
    }
}
