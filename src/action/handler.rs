//! The action handler stage.
//!
//! Maps the connection's path info to a registered action and runs it.

use axum::http::StatusCode;

use crate::action::registry::ActionRegistry;
use crate::http::connection::Connection;
use crate::http::stage::Stage;
use crate::observability::metrics;

pub const ACTION_HANDLER: &str = "actionHandler";

#[derive(Debug, Clone)]
pub struct ActionHandler {
    registry: ActionRegistry,
}

impl ActionHandler {
    pub fn new(registry: ActionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run the action registered for the connection's path info.
    ///
    /// A miss answers 404 and has no other effect. A hit runs the action once;
    /// an action error becomes the response.
    pub fn dispatch(&self, conn: &mut Connection) {
        let path = conn.path_info().to_string();
        let Some(action) = self.registry.get(&path) else {
            metrics::record_action_not_found();
            conn.error(StatusCode::NOT_FOUND, format!("Cannot find action: {}", path));
            return;
        };

        if let Err(e) = action.run(conn) {
            tracing::warn!(
                connection_id = %conn.id(),
                action = %path,
                error = %e,
                "Action failed"
            );
            conn.error(e.status(), e.to_string());
        }
        if !conn.is_finalized() {
            conn.finalize();
        }
    }
}

impl Stage for ActionHandler {
    fn name(&self) -> &str {
        ACTION_HANDLER
    }

    fn process(&self, conn: &mut Connection) {
        self.dispatch(conn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::registry::{action, ActionError};
    use crate::context::ServerContext;
    use crate::http::request::RequestInfo;
    use axum::http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn connection(ctx: &ServerContext, path: &str) -> Connection {
        let host = ctx.create_default_host().unwrap();
        Connection::new(host, RequestInfo::new(Method::GET, path))
    }

    #[test]
    fn test_miss_is_404_only() {
        let ctx = ServerContext::new();
        let handler = ActionHandler::new(ActionRegistry::new());
        let mut conn = connection(&ctx, "/missing");
        handler.dispatch(&mut conn);
        assert_eq!(conn.status(), StatusCode::NOT_FOUND);
        assert_eq!(conn.body(), b"Cannot find action: /missing");
        assert!(conn.headers().get("location").is_none());
    }

    #[test]
    fn test_hit_runs_once() {
        let ctx = ServerContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ActionRegistry::new();
        let counter = calls.clone();
        registry.define(
            "/hello",
            action(move |conn| {
                counter.fetch_add(1, Ordering::SeqCst);
                conn.write("hi");
                Ok(())
            }),
        );
        let handler = ActionHandler::new(registry);

        let mut conn = connection(&ctx, "/hello");
        handler.process(&mut conn);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(conn.body(), b"hi");
        assert!(conn.is_finalized());
    }

    #[test]
    fn test_action_error_becomes_response() {
        let ctx = ServerContext::new();
        let registry = ActionRegistry::new();
        registry.define(
            "/fail",
            action(|conn| {
                conn.write("partial");
                Err(ActionError::new(StatusCode::BAD_REQUEST, "bad input"))
            }),
        );
        let handler = ActionHandler::new(registry);

        let mut conn = connection(&ctx, "/fail");
        handler.dispatch(&mut conn);
        assert_eq!(conn.status(), StatusCode::BAD_REQUEST);
        assert_eq!(conn.body(), b"bad input");
    }
}
