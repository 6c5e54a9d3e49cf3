//! Request-scoped exchange state.
//!
//! # Responsibilities
//! - Carry the resolved host and route for one request
//! - Collect the response (status, headers, body) written by stages
//! - Generate unique connection IDs for tracing
//!
//! # Design Decisions
//! - Writes after `finalize` are ignored
//! - `error` replaces any partial body and finalizes the exchange

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::host::Host;
use crate::http::request::RequestInfo;
use crate::routing::route::Route;

/// Relaxed ordering is enough: IDs only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    host: Arc<Host>,
    route: Option<Arc<Route>>,
    request: RequestInfo,
    path_info: String,
    request_body: Bytes,
    streaming: bool,

    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    finalized: bool,
    error: Option<String>,
}

impl Connection {
    pub fn new(host: Arc<Host>, request: RequestInfo) -> Self {
        let path_info = request.path.clone();
        Self {
            id: ConnectionId::new(),
            host,
            route: None,
            request,
            path_info,
            request_body: Bytes::new(),
            streaming: false,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            finalized: false,
            error: None,
        }
    }

    pub fn with_route(mut self, route: Arc<Route>) -> Self {
        self.route = Some(route);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// Path the handler resolves against. Defaults to the request path.
    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn set_path_info(&mut self, path_info: impl Into<String>) {
        self.path_info = path_info.into();
    }

    pub fn request_body(&self) -> &Bytes {
        &self.request_body
    }

    pub fn set_request_body(&mut self, body: Bytes) {
        self.request_body = body;
    }

    /// True if the request body is handed over as it arrives rather than buffered.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if !self.finalized {
            self.status = status;
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if !self.finalized {
            self.headers.insert(name, value);
        }
    }

    /// Set the response content type. Invalid values are ignored.
    pub fn set_content_type(&mut self, content_type: &str) {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.set_header(CONTENT_TYPE, value);
        }
    }

    /// Append to the response body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        if !self.finalized {
            self.body.extend_from_slice(data.as_ref());
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Mark the response complete. Later writes are ignored.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Fail the exchange: the message becomes the plain-text body.
    pub fn error(&mut self, status: StatusCode, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(
            connection_id = %self.id,
            status = status.as_u16(),
            message = %message,
            "Request failed"
        );
        self.status = status;
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = message.clone().into_bytes();
        self.error = Some(message);
        self.finalized = true;
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl IntoResponse for Connection {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
