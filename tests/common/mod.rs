//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;

use vhost_router::action::ActionRegistry;
use vhost_router::config::loader::from_toml_str;
use vhost_router::http::HttpServer;

pub const ADMIN_KEY: &str = "test-admin-key";

/// Build a server from TOML text with the given actions.
pub fn server(toml: &str, actions: ActionRegistry) -> HttpServer {
    let config = from_toml_str(toml).unwrap();
    HttpServer::new(config, actions).unwrap()
}

pub fn request(method: Method, host: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("host", host)
        .body(Body::empty())
        .unwrap()
}

pub fn get(host: &str, uri: &str) -> Request<Body> {
    request(Method::GET, host, uri)
}

/// Send one request through a router and collect the body as text.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_text(response).await)
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
