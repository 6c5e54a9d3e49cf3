//! Registry of the hosts known to a server context.
//!
//! # Responsibilities
//! - Keep every created host alive for the lifetime of the context
//! - Track the designated default host
//! - Resolve a request's host identity to a host
//!
//! # Design Decisions
//! - Host list behind an `RwLock`: written at configuration time, read per request
//! - Default host in an `ArcSwapOption` so request paths never lock for it
//! - Name matching is case-insensitive and ignores the port

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwapOption;

use crate::host::Host;
use crate::http::request::normalize_host;

#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: RwLock<Vec<Arc<Host>>>,
    default_host: ArcSwapOption<Host>,
    closed: AtomicBool,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, host: Arc<Host>) {
        self.hosts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(host);
    }

    /// Snapshot of all hosts, in creation order.
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Host with this name, if any.
    pub fn lookup(&self, name: &str) -> Option<Arc<Host>> {
        let wanted = normalize_host(name);
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|h| h.name().is_some_and(|n| normalize_host(&n) == wanted))
            .cloned()
    }

    pub fn default_host(&self) -> Option<Arc<Host>> {
        self.default_host.load_full()
    }

    pub fn set_default_host(&self, host: Option<Arc<Host>>) {
        self.default_host.store(host);
    }

    /// Host serving a request for `host_header`: an exact name match, else
    /// the default host.
    pub fn resolve(&self, host_header: Option<&str>) -> Option<Arc<Host>> {
        host_header
            .and_then(|h| self.lookup(h))
            .or_else(|| self.default_host())
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// True once the owning context has been stopped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
