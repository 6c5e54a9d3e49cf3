//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (parents and handlers exist)
//! - Check route definitions compile (pattern, target, conditions, methods)
//! - Validate addresses and levels
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::action::ACTION_HANDLER;
use crate::config::schema::{HostConfig, RouteConfig, ServerConfig};
use crate::http::stage::PASS_HANDLER;
use crate::routing::condition::parse_condition;
use crate::routing::matcher::PathPattern;
use crate::routing::route::normalize_pattern;
use crate::routing::target::Target;

/// Handler names every context provides.
pub const BUILTIN_HANDLERS: &[&str] = &[PASS_HANDLER, ACTION_HANDLER];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate host name {0}")]
    DuplicateHost(String),

    #[error("host #{0} has no name and is not the default host")]
    UnnamedHost(usize),

    #[error("host {host} names unknown parent {parent}")]
    UnknownParentHost { host: String, parent: String },

    #[error("host {0} is part of a parent cycle")]
    ParentCycle(String),

    #[error("more than one default host")]
    MultipleDefaultHosts,

    #[error("default host {0} cannot be a virtual host")]
    DefaultHostWithParent(String),

    #[error("host {host}: route #{index} has no name")]
    EmptyRouteName { host: String, index: usize },

    #[error("host {host}: duplicate route {route}")]
    DuplicateRoute { host: String, route: String },

    #[error("host {host}: route {route} names unknown handler {handler}")]
    UnknownHandler {
        host: String,
        route: String,
        handler: String,
    },

    #[error("host {host}: route {route} names unknown parent route {parent}")]
    UnknownParentRoute {
        host: String,
        route: String,
        parent: String,
    },

    #[error("host {host}: route {route}: {reason}")]
    InvalidRoute {
        host: String,
        route: String,
        reason: String,
    },

    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    #[error("admin API enabled without an api_key")]
    MissingAdminKey,
}

/// Render a list of errors on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Label used for a host in error messages.
pub fn host_label(host: &HostConfig) -> String {
    host.name.clone().unwrap_or_else(|| "<default>".to_string())
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener", &config.listener.bind_address);
    if let Some(secure) = &config.listener.secure_address {
        check_address(&mut errors, "secure listener", secure);
    }
    if config.observability.metrics_enabled {
        check_address(&mut errors, "metrics", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    validate_hosts(&mut errors, &config.hosts);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn validate_hosts(errors: &mut Vec<ValidationError>, hosts: &[HostConfig]) {
    let mut by_name: HashMap<&str, &HostConfig> = HashMap::new();
    for (index, host) in hosts.iter().enumerate() {
        match &host.name {
            Some(name) => {
                if by_name.insert(name.as_str(), host).is_some() {
                    errors.push(ValidationError::DuplicateHost(name.clone()));
                }
            }
            None if !host.default => errors.push(ValidationError::UnnamedHost(index)),
            None => {}
        }
    }

    let defaults: Vec<&HostConfig> = hosts.iter().filter(|h| h.default).collect();
    if defaults.len() > 1 {
        errors.push(ValidationError::MultipleDefaultHosts);
    }
    for host in &defaults {
        if host.parent.is_some() {
            errors.push(ValidationError::DefaultHostWithParent(host_label(host)));
        }
    }

    for host in hosts {
        let label = host_label(host);
        if let Some(parent) = &host.parent {
            if !by_name.contains_key(parent.as_str()) {
                errors.push(ValidationError::UnknownParentHost {
                    host: label.clone(),
                    parent: parent.clone(),
                });
            } else if in_cycle(host, &by_name) {
                errors.push(ValidationError::ParentCycle(label.clone()));
            }
        }

        // Routes visible to this host through its ancestors.
        let inherited = ancestor_routes(host, &by_name);
        validate_routes(errors, &label, &host.routes, &inherited);
    }
}

fn in_cycle(host: &HostConfig, by_name: &HashMap<&str, &HostConfig>) -> bool {
    let Some(start) = host.name.as_deref() else {
        return false;
    };
    let mut seen = HashSet::new();
    let mut current = host;
    while let Some(parent) = current.parent.as_deref() {
        if parent == start {
            return true;
        }
        if !seen.insert(parent) {
            return false;
        }
        match by_name.get(parent) {
            Some(&next) => current = next,
            None => return false,
        }
    }
    false
}

fn ancestor_routes<'a>(
    host: &HostConfig,
    by_name: &HashMap<&str, &'a HostConfig>,
) -> HashSet<&'a str> {
    let mut names = HashSet::new();
    if host.reset_routes {
        return names;
    }
    let mut seen = HashSet::new();
    let mut parent = host.parent.as_deref();
    while let Some(name) = parent {
        if !seen.insert(name) {
            break;
        }
        let Some(&ancestor) = by_name.get(name) else {
            break;
        };
        names.extend(ancestor.routes.iter().map(|r| r.name.as_str()));
        if ancestor.reset_routes {
            break;
        }
        parent = ancestor.parent.as_deref();
    }
    names
}

fn validate_routes(
    errors: &mut Vec<ValidationError>,
    host: &str,
    routes: &[RouteConfig],
    inherited: &HashSet<&str>,
) {
    let mut defined: HashSet<&str> = HashSet::new();
    for (index, route) in routes.iter().enumerate() {
        if route.name.is_empty() {
            errors.push(ValidationError::EmptyRouteName {
                host: host.to_string(),
                index,
            });
            continue;
        }
        if !defined.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute {
                host: host.to_string(),
                route: route.name.clone(),
            });
        }

        let invalid = |reason: String| ValidationError::InvalidRoute {
            host: host.to_string(),
            route: route.name.clone(),
            reason,
        };
        if let Err(e) = PathPattern::parse(normalize_pattern(&route.pattern)) {
            errors.push(invalid(e.to_string()));
        }
        if let Err(e) = Target::parse(&route.target) {
            errors.push(invalid(e.to_string()));
        }
        for condition in &route.conditions {
            if let Err(e) = parse_condition(condition) {
                errors.push(invalid(e.to_string()));
            }
        }
        for method in &route.methods {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(invalid(format!("invalid method {method:?}")));
            }
        }

        let handlers = route
            .handler
            .iter()
            .chain(route.handlers.iter())
            .chain(route.extensions.values());
        for handler in handlers {
            if !BUILTIN_HANDLERS.contains(&handler.as_str()) {
                errors.push(ValidationError::UnknownHandler {
                    host: host.to_string(),
                    route: route.name.clone(),
                    handler: handler.clone(),
                });
            }
        }

        if let Some(parent) = &route.parent {
            let known = (defined.contains(parent.as_str()) && parent != &route.name)
                || inherited.contains(parent.as_str());
            if !known {
                errors.push(ValidationError::UnknownParentRoute {
                    host: host.to_string(),
                    route: route.name.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> ServerConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r#"
            [[hosts]]
            name = "example.com"
            default = true

            [[hosts.routes]]
            name = "base"
            pattern = "^/app/(.*)"
            handler = "actionHandler"

            [[hosts]]
            name = "api.example.com"
            parent = "example.com"

            [[hosts.routes]]
            name = "child"
            pattern = "^/app/v2"
            parent = "base"
            conditions = ["secure", "header x-mode beta"]
            "#,
        );
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_host_errors() {
        let config = parse(
            r#"
            [[hosts]]
            default = true
            parent = "b"

            [[hosts]]
            default = true

            [[hosts]]
            name = "a"
            parent = "b"

            [[hosts]]
            name = "b"
            parent = "a"

            [[hosts]]
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MultipleDefaultHosts));
        assert!(errors.contains(&ValidationError::DefaultHostWithParent("<default>".into())));
        assert!(errors.contains(&ValidationError::ParentCycle("a".into())));
        assert!(errors.contains(&ValidationError::ParentCycle("b".into())));
        assert!(errors.contains(&ValidationError::UnnamedHost(4)));
    }

    #[test]
    fn test_route_errors() {
        let config = parse(
            r#"
            [[hosts]]
            default = true

            [[hosts.routes]]
            name = "a"
            pattern = "^/a/[0-9]+"
            target = "redirect 200 /x"
            methods = ["G E T"]
            handler = "fileHandler"
            conditions = ["cookie x"]
            parent = "later"

            [[hosts.routes]]
            name = "a"

            [[hosts.routes]]
            name = "later"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        let invalid = errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidRoute { .. }))
            .count();
        assert_eq!(invalid, 4);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownHandler { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownParentRoute { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateRoute { .. })));
    }

    #[test]
    fn test_reset_routes_hides_ancestor_routes() {
        let config = parse(
            r#"
            [[hosts]]
            name = "example.com"
            default = true

            [[hosts.routes]]
            name = "app"
            pattern = "^/app/(.*)"

            [[hosts]]
            name = "v.example.com"
            parent = "example.com"
            reset_routes = true

            [[hosts.routes]]
            name = "child"
            pattern = "^/app/v2"
            parent = "app"
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownParentRoute { route, .. } if route == "child"
        )));
    }

    #[test]
    fn test_global_errors() {
        let config = parse(
            r#"
            [listener]
            bind_address = "not-an-address"

            [observability]
            log_level = "loud"

            [admin]
            enabled = true
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::MissingAdminKey));
    }
}
