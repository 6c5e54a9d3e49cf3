//! Request description used for host resolution and route matching.
//!
//! # Responsibilities
//! - Extract routing-relevant information (host, method, path, headers)
//! - Normalize the host identity (port stripped, lowercase)
//!
//! # Design Decisions
//! - Built once per request from the parsed head; the body travels separately
//! - Independent of the transport so matching can be tested without a server

use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Routing view of an inbound request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Host identity without port, lowercased.
    pub host: Option<String>,
    pub headers: HeaderMap,
    /// True if the request arrived on a secure endpoint.
    pub secure: bool,
}

impl RequestInfo {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            host: None,
            headers: HeaderMap::new(),
            secure: false,
        }
    }

    /// Build from a parsed request head.
    pub fn from_parts(parts: &Parts, secure: bool) -> Self {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.host())
            .map(normalize_host);

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            host,
            headers: parts.headers.clone(),
            secure,
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(normalize_host(host));
        self
    }

    /// Add a header. Names must be lowercase.
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Path and query as received.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Extension of the last path segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let last = self.path.rsplit('/').next()?;
        let (stem, ext) = last.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }
}

/// Strip any port and lowercase a host identity.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let name = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or(host)
    };
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM:8080"), "example.com");
        assert_eq!(normalize_host("example.com"), "example.com");
        assert_eq!(normalize_host("[::1]:443"), "[::1]");
    }

    #[test]
    fn test_from_parts() {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri("/api/items?id=3")
            .header("Host", "API.example.com:443")
            .body(())
            .unwrap()
            .into_parts();
        let info = RequestInfo::from_parts(&parts, true);
        assert_eq!(info.method, Method::POST);
        assert_eq!(info.path, "/api/items");
        assert_eq!(info.query.as_deref(), Some("id=3"));
        assert_eq!(info.host.as_deref(), Some("api.example.com"));
        assert_eq!(info.uri(), "/api/items?id=3");
        assert!(info.secure);
    }

    #[test]
    fn test_extension() {
        assert_eq!(RequestInfo::new(Method::GET, "/docs/index.html").extension(), Some("html"));
        assert_eq!(RequestInfo::new(Method::GET, "/docs.d/readme").extension(), None);
        assert_eq!(RequestInfo::new(Method::GET, "/.hidden").extension(), None);
    }
}
