//! Per-route request tracing.
//!
//! # Responsibilities
//! - Describe the trace settings a route can carry
//! - Emit request/response trace events for traced routes
//!
//! # Design Decisions
//! - Optional: hosts start with tracing disabled
//! - Routes without their own settings may inherit them from a parent route at host start
//! - Level is chosen per route, headers are logged only when asked for

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::http::connection::Connection;

/// Verbosity of a route's trace events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<TraceLevel> for Level {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Error => Level::ERROR,
            TraceLevel::Warn => Level::WARN,
            TraceLevel::Info => Level::INFO,
            TraceLevel::Debug => Level::DEBUG,
            TraceLevel::Trace => Level::TRACE,
        }
    }
}

/// Trace settings attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteTrace {
    /// Level the request/response events are emitted at.
    pub level: TraceLevel,

    /// Include request headers in the request event.
    pub headers: bool,
}

// `tracing::event!` needs the level as a constant.
macro_rules! emit {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            TraceLevel::Error => tracing::event!(Level::ERROR, $($rest)+),
            TraceLevel::Warn => tracing::event!(Level::WARN, $($rest)+),
            TraceLevel::Info => tracing::event!(Level::INFO, $($rest)+),
            TraceLevel::Debug => tracing::event!(Level::DEBUG, $($rest)+),
            TraceLevel::Trace => tracing::event!(Level::TRACE, $($rest)+),
        }
    };
}

/// Settings in effect for a connection, if its host and route are traced.
fn active_trace(conn: &Connection) -> Option<(TraceLevel, bool)> {
    if conn.host().no_trace() {
        return None;
    }
    let trace = conn.route()?.trace()?;
    Some((trace.level, trace.headers))
}

/// Emit the request event for a traced route.
pub fn trace_request(conn: &Connection) {
    let Some((level, headers)) = active_trace(conn) else {
        return;
    };
    let host = conn.host().name().unwrap_or_default();
    let route = conn.route().map(|r| r.name().to_string()).unwrap_or_default();
    let request = conn.request();
    if headers {
        emit!(
            level,
            connection_id = %conn.id(),
            host = %host,
            route = %route,
            method = %request.method,
            path = %request.path,
            headers = ?request.headers,
            "Request"
        );
    } else {
        emit!(
            level,
            connection_id = %conn.id(),
            host = %host,
            route = %route,
            method = %request.method,
            path = %request.path,
            "Request"
        );
    }
}

/// Emit the response event for a traced route.
pub fn trace_response(conn: &Connection) {
    let Some((level, _)) = active_trace(conn) else {
        return;
    };
    emit!(
        level,
        connection_id = %conn.id(),
        status = conn.status().as_u16(),
        bytes = conn.body().len(),
        "Response"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_config_parse() {
        let trace: RouteTrace = toml::from_str("level = \"debug\"\nheaders = true").unwrap();
        assert_eq!(trace.level, TraceLevel::Debug);
        assert!(trace.headers);

        let trace: RouteTrace = toml::from_str("").unwrap();
        assert_eq!(trace, RouteTrace::default());
        assert_eq!(Level::from(trace.level), Level::INFO);
    }
}
