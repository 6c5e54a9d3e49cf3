//! Serving over a real TCP listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use vhost_router::action::{action, ActionRegistry};
use vhost_router::http::Connection;
use vhost_router::lifecycle::Shutdown;

mod common;

const CONFIG: &str = r#"
[listener]
bind_address = "127.0.0.1:0"

[[hosts]]
name = "api.local"
default = true

[[hosts.routes]]
name = "action"
pattern = "^/action/(.*)"
handler = "actionHandler"
"#;

#[tokio::test]
async fn test_serve_over_tcp() {
    let actions = ActionRegistry::new();
    actions.define(
        "/action/echo",
        action(|conn: &mut Connection| {
            let body = conn.request_body().clone();
            conn.write(body);
            Ok(())
        }),
    );
    let server = common::server(CONFIG, actions);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let app = server.router(false);
    let serving = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(signal.wait())
            .await
    });

    let client = reqwest::Client::new();
    let res = client
        .post(format!("http://{addr}/action/echo"))
        .body("ping")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "ping");

    let res = client
        .get(format!("http://{addr}/action/none"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "Cannot find action: /action/none");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_run_stops_hosts_on_shutdown() {
    let server = Arc::new(common::server(CONFIG, ActionRegistry::new()));
    let route = server
        .state()
        .load()
        .context
        .default_host()
        .unwrap()
        .lookup_route("action")
        .unwrap();
    assert!(route.is_started());

    let shutdown = Arc::new(Shutdown::new());
    let running = {
        let server = server.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.run(&shutdown).await })
    };

    // Give the endpoint a moment to bind before asking it to stop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(!route.is_started());
    assert!(server.state().load().context.hosts().is_closed());
}
