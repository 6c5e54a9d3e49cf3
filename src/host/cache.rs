//! Response cache shared by a host and its virtual hosts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::StatusCode;
use dashmap::DashMap;

/// A stored response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
    expires: Instant,
}

impl CachedResponse {
    pub fn new(status: StatusCode, content_type: Option<String>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
            expires: Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }
}

/// Thread-safe response cache keyed by request URI.
///
/// Entries never outlive `max_duration`, whatever lifespan the route asks for.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<DashMap<String, CachedResponse>>,
    max_duration: Duration,
}

impl ResponseCache {
    pub fn new(max_duration: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_duration,
        }
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Live entry for `key`. Expired entries are dropped on the way.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.inner.get(key).map(|r| r.value().clone())?;
        if entry.is_expired() {
            // Only the expired value goes; a fresh one stored meanwhile stays.
            self.inner.remove_if(key, |_, v| v.is_expired());
            return None;
        }
        Some(entry)
    }

    /// Store a response for at most `lifespan`, clamped to `max_duration`.
    pub fn insert(&self, key: impl Into<String>, mut response: CachedResponse, lifespan: Duration) {
        let lifespan = lifespan.min(self.max_duration);
        if lifespan.is_zero() {
            return;
        }
        response.expires = Instant::now() + lifespan;
        self.inner.insert(key.into(), response);
    }

    pub fn remove(&self, key: &str) -> Option<CachedResponse> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, v| !v.is_expired());
        before.saturating_sub(self.inner.len())
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
