//! Route conditions.
//!
//! # Responsibilities
//! - Match host identity (exact match, case-insensitive)
//! - Match request headers (exact value, name case-insensitive)
//! - Match secure endpoints
//! - Parse condition directives from configuration
//!
//! # Design Decisions
//! - A route's conditions combine with AND semantics
//! - Empty condition list = always matches
//! - No regex to guarantee O(n) matching

use std::fmt;

use crate::http::request::{normalize_host, RequestInfo};
use crate::routing::route::RouteError;

/// A test a request must pass for a route to be selected.
pub trait Condition: Send + Sync + fmt::Debug {
    /// Directive name, as shown in the route report.
    fn name(&self) -> &str;

    /// Directive arguments, as shown in the route report.
    fn details(&self) -> Option<String> {
        None
    }

    /// Returns true if the request satisfies this condition.
    fn matches(&self, req: &RequestInfo) -> bool;
}

/// Matches the request's host identity.
#[derive(Debug, Clone)]
pub struct HostCondition {
    expected_host: String,
}

impl HostCondition {
    /// The host is normalized (port stripped, lowercase) for comparison.
    pub fn new(host: &str) -> Self {
        Self {
            expected_host: normalize_host(host),
        }
    }
}

impl Condition for HostCondition {
    fn name(&self) -> &str {
        "host"
    }

    fn details(&self) -> Option<String> {
        Some(self.expected_host.clone())
    }

    fn matches(&self, req: &RequestInfo) -> bool {
        req.host.as_deref() == Some(self.expected_host.as_str())
    }
}

/// Matches a request header value exactly.
#[derive(Debug, Clone)]
pub struct HeaderCondition {
    header: String,
    value: String,
}

impl HeaderCondition {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
            value: value.into(),
        }
    }
}

impl Condition for HeaderCondition {
    fn name(&self) -> &str {
        "header"
    }

    fn details(&self) -> Option<String> {
        Some(format!("{} {}", self.header, self.value))
    }

    fn matches(&self, req: &RequestInfo) -> bool {
        req.headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(|v| v == self.value)
            .unwrap_or(false)
    }
}

/// Matches requests that arrived on a secure endpoint.
#[derive(Debug, Clone, Default)]
pub struct SecureCondition;

impl Condition for SecureCondition {
    fn name(&self) -> &str {
        "secure"
    }

    fn matches(&self, req: &RequestInfo) -> bool {
        req.secure
    }
}

/// Parse a condition directive: `secure`, `host <name>` or `header <name> <value>`.
pub fn parse_condition(directive: &str) -> Result<Box<dyn Condition>, RouteError> {
    let invalid = |reason: &str| RouteError::InvalidCondition {
        condition: directive.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = directive.split_whitespace();
    let Some(kind) = parts.next() else {
        return Err(invalid("empty condition"));
    };
    match kind.to_ascii_lowercase().as_str() {
        "secure" => Ok(Box::new(SecureCondition)),
        "host" => {
            let host = parts.next().ok_or_else(|| invalid("missing host name"))?;
            Ok(Box::new(HostCondition::new(host)))
        }
        "header" => {
            let name = parts.next().ok_or_else(|| invalid("missing header name"))?;
            let value = parts.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return Err(invalid("missing header value"));
            }
            Ok(Box::new(HeaderCondition::new(name, value)))
        }
        _ => Err(invalid("unknown condition")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_host_condition() {
        let cond = HostCondition::new("example.com");

        let req = RequestInfo::new(Method::GET, "/").with_host("EXAMPLE.COM:8080");
        assert!(cond.matches(&req)); // Case insensitive, port ignored

        let req = RequestInfo::new(Method::GET, "/").with_host("other.com");
        assert!(!cond.matches(&req));

        assert!(!cond.matches(&RequestInfo::new(Method::GET, "/")));
    }

    #[test]
    fn test_header_condition() {
        let cond = HeaderCondition::new("X-Api-Version", "2");
        let req = RequestInfo::new(Method::GET, "/").with_header("x-api-version", "2");
        assert!(cond.matches(&req));

        let req = RequestInfo::new(Method::GET, "/").with_header("x-api-version", "1");
        assert!(!cond.matches(&req));
    }

    #[test]
    fn test_parse_condition() {
        let cond = parse_condition("header X-Mode beta build").unwrap();
        assert_eq!(cond.name(), "header");
        assert_eq!(cond.details().as_deref(), Some("x-mode beta build"));

        assert_eq!(parse_condition("secure").unwrap().name(), "secure");
        assert!(parse_condition("host").is_err());
        assert!(parse_condition("cookie a=b").is_err());
        assert!(parse_condition("   ").is_err());
    }
}
