//! Target dispatch for a routed connection.
//!
//! # Responsibilities
//! - Serve `redirect` and `write` targets directly
//! - Hand `run` targets to the stage the route selects
//! - Close the exchange if the stage left it open
//!
//! # Design Decisions
//! - Synchronous: stages run to completion on the request task
//! - A `run` route without a usable stage answers 404

use axum::http::header::{HeaderValue, LOCATION};
use axum::http::StatusCode;

use crate::http::connection::Connection;
use crate::routing::target::Target;

/// Run the connection's route target.
pub fn process(conn: &mut Connection) {
    let Some(route) = conn.route().cloned() else {
        conn.error(StatusCode::NOT_FOUND, "No matching route");
        return;
    };

    match route.target() {
        Target::Redirect { status, location } => match HeaderValue::from_str(location) {
            Ok(value) => {
                conn.set_status(*status);
                conn.set_header(LOCATION, value);
                conn.finalize();
            }
            Err(_) => conn.error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Invalid redirect location on route {}", route.name()),
            ),
        },
        Target::Write { status, body } => {
            conn.set_status(*status);
            conn.set_content_type("text/plain; charset=utf-8");
            conn.write(body);
            conn.finalize();
        }
        Target::Run(_) => match route.select_handler(conn.request()) {
            Some(stage) => {
                tracing::trace!(
                    connection_id = %conn.id(),
                    route = %route.name(),
                    stage = %stage.name(),
                    "Dispatching"
                );
                stage.process(conn);
            }
            None => {
                let message = format!("No handler for {}", conn.request().path);
                conn.error(StatusCode::NOT_FOUND, message);
            }
        },
    }

    if !conn.is_finalized() {
        conn.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::Method;

    use crate::action::action;
    use crate::context::ServerContext;
    use crate::http::request::RequestInfo;
    use crate::routing::Route;

    fn run(ctx: &ServerContext, route: Arc<Route>, path: &str) -> Connection {
        let host = ctx.create_default_host().unwrap();
        let mut conn =
            Connection::new(host, RequestInfo::new(Method::GET, path)).with_route(route);
        process(&mut conn);
        conn
    }

    #[test]
    fn test_write_target() {
        let ctx = ServerContext::new();
        let route = Route::builder("status")
            .target(Target::parse("write 202 accepted").unwrap())
            .build()
            .unwrap();
        let conn = run(&ctx, route, "/status");
        assert_eq!(conn.status(), StatusCode::ACCEPTED);
        assert_eq!(conn.body(), b"accepted");
        assert!(conn.is_finalized());
    }

    #[test]
    fn test_redirect_target() {
        let ctx = ServerContext::new();
        let route = Route::builder("old")
            .target(Target::parse("redirect 301 /new").unwrap())
            .build()
            .unwrap();
        let conn = run(&ctx, route, "/old");
        assert_eq!(conn.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(conn.headers().get(LOCATION).unwrap(), "/new");
    }

    #[test]
    fn test_run_without_handler_is_404() {
        let ctx = ServerContext::new();
        let route = Route::builder("bare").pattern("/bare").build().unwrap();
        let conn = run(&ctx, route, "/bare");
        assert_eq!(conn.status(), StatusCode::NOT_FOUND);
        assert_eq!(conn.error_message(), Some("No handler for /bare"));
    }

    #[test]
    fn test_run_dispatches_action() {
        let ctx = ServerContext::new();
        let handler = ctx.open_action_handler();
        handler.registry().define(
            "/act/hello",
            action(|conn: &mut Connection| {
                conn.write("hi");
                Ok(())
            }),
        );
        let route = Route::builder("act")
            .pattern("^/act/(.*)")
            .handler(handler)
            .build()
            .unwrap();
        let conn = run(&ctx, route, "/act/hello");
        assert_eq!(conn.status(), StatusCode::OK);
        assert_eq!(conn.body(), b"hi");
        assert!(conn.is_finalized());
    }

    #[test]
    fn test_pass_handler_finalizes_empty() {
        let ctx = ServerContext::new();
        let route = Route::builder("pass")
            .handler(ctx.stage("passHandler").unwrap())
            .build()
            .unwrap();
        let conn = run(&ctx, route, "/anything");
        assert_eq!(conn.status(), StatusCode::OK);
        assert!(conn.body().is_empty());
        assert!(conn.is_finalized());
    }
}
