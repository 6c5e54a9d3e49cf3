//! Hosts and virtual hosts.
//!
//! # Responsibilities
//! - Own a route table, a streaming table and a response cache
//! - Create virtual hosts that share their parent's tables until first write
//! - Start and stop the routes of a host
//! - Look routes up by name and pattern
//!
//! # Design Decisions
//! - Parent and endpoint references are weak; the context's registry owns hosts
//! - Tables are read lock-free; writes copy, mutate and publish a new snapshot
//! - A virtual host shares the parent's response cache for its whole life

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use arc_swap::ArcSwapOption;
use thiserror::Error;

use crate::context::ServerContext;
use crate::host::cache::ResponseCache;
use crate::host::cow::CowTable;
use crate::host::streaming::StreamingTable;
use crate::http::request::RequestInfo;
use crate::net::Endpoint;
use crate::routing::route::{Route, RouteError};
use crate::routing::table::{Insertion, RouteTable};

#[derive(Debug, Error)]
pub enum HostError {
    /// The context was stopped; no new hosts are accepted.
    #[error("Server context is shut down")]
    ContextClosed,

    #[error("Route failed to start on host {host}: {source}")]
    Route {
        host: String,
        #[source]
        source: RouteError,
    },
}

#[derive(Debug, Clone, Default)]
struct Identity {
    name: Option<String>,
    ip: Option<String>,
    port: Option<u16>,
}

pub struct Host {
    identity: RwLock<Identity>,
    parent: Option<Weak<Host>>,
    routes: CowTable<RouteTable>,
    streams: CowTable<StreamingTable>,
    cache: ResponseCache,
    default_route: ArcSwapOption<Route>,
    default_endpoint: RwLock<Weak<Endpoint>>,
    secure_endpoint: RwLock<Weak<Endpoint>>,
    vhost: bool,
    no_trace: AtomicBool,
}

fn routes_of(host: &Host) -> &CowTable<RouteTable> {
    &host.routes
}

fn streams_of(host: &Host) -> &CowTable<StreamingTable> {
    &host.streams
}

impl Host {
    /// Create a host with empty routes and the default streaming rules, and
    /// register it with `ctx`.
    pub fn create(ctx: &ServerContext) -> Result<Arc<Host>, HostError> {
        let registry = ctx.hosts();
        if registry.is_closed() {
            return Err(HostError::ContextClosed);
        }
        let host = Arc::new(Host {
            identity: RwLock::new(Identity::default()),
            parent: None,
            routes: CowTable::owned(RouteTable::new()),
            streams: CowTable::owned(StreamingTable::with_defaults()),
            cache: ResponseCache::new(ctx.cache_max_duration()),
            default_route: ArcSwapOption::empty(),
            default_endpoint: RwLock::new(Weak::new()),
            secure_endpoint: RwLock::new(Weak::new()),
            vhost: false,
            no_trace: AtomicBool::new(true),
        });
        registry.add(host.clone());
        tracing::debug!(hosts = registry.len(), "Host created");
        Ok(host)
    }

    /// Create a virtual host of `parent`.
    ///
    /// The new host reads the parent's routes and streaming rules until it
    /// changes its own, and shares the parent's cache and endpoints. Name,
    /// address, port and the default route are not copied.
    pub fn clone_from(ctx: &ServerContext, parent: &Arc<Host>) -> Result<Arc<Host>, HostError> {
        let registry = ctx.hosts();
        if registry.is_closed() {
            return Err(HostError::ContextClosed);
        }
        let host = Arc::new(Host {
            identity: RwLock::new(Identity::default()),
            parent: Some(Arc::downgrade(parent)),
            routes: CowTable::shared(parent, routes_of),
            streams: CowTable::shared(parent, streams_of),
            cache: parent.cache.clone(),
            default_route: ArcSwapOption::empty(),
            default_endpoint: RwLock::new(read_weak(&parent.default_endpoint)),
            secure_endpoint: RwLock::new(read_weak(&parent.secure_endpoint)),
            vhost: true,
            no_trace: AtomicBool::new(parent.no_trace()),
        });
        registry.add(host.clone());
        tracing::debug!(parent = ?parent.name(), "Virtual host created");
        Ok(host)
    }

    pub fn name(&self) -> Option<String> {
        self.identity().name
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .name = Some(name.into());
    }

    pub fn ip(&self) -> Option<String> {
        self.identity().ip
    }

    pub fn port(&self) -> Option<u16> {
        self.identity().port
    }

    pub fn set_ip_port(&self, ip: Option<String>, port: Option<u16>) {
        let mut identity = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        identity.ip = ip;
        identity.port = port;
    }

    fn identity(&self) -> Identity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn parent(&self) -> Option<Arc<Host>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_vhost(&self) -> bool {
        self.vhost
    }

    /// True while request tracing is disabled for this host.
    pub fn no_trace(&self) -> bool {
        self.no_trace.load(Ordering::Relaxed)
    }

    pub fn set_no_trace(&self, no_trace: bool) {
        self.no_trace.store(no_trace, Ordering::Relaxed);
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Snapshot of the route table.
    pub fn route_table(&self) -> Arc<RouteTable> {
        self.routes.load()
    }

    /// True while this host still reads its parent's route table.
    pub fn shares_routes(&self) -> bool {
        self.routes.is_shared()
    }

    pub fn streaming_table(&self) -> Arc<StreamingTable> {
        self.streams.load()
    }

    pub fn shares_streaming(&self) -> bool {
        self.streams.is_shared()
    }

    pub fn default_route(&self) -> Option<Arc<Route>> {
        self.default_route.load_full()
    }

    pub fn set_default_route(&self, route: Option<Arc<Route>>) {
        self.default_route.store(route);
    }

    pub fn default_endpoint(&self) -> Option<Arc<Endpoint>> {
        read_weak(&self.default_endpoint).upgrade()
    }

    pub fn set_default_endpoint(&self, endpoint: &Arc<Endpoint>) {
        *self
            .default_endpoint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(endpoint);
    }

    pub fn secure_endpoint(&self) -> Option<Arc<Endpoint>> {
        read_weak(&self.secure_endpoint).upgrade()
    }

    pub fn set_secure_endpoint(&self, endpoint: &Arc<Endpoint>) {
        *self
            .secure_endpoint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(endpoint);
    }

    /// Add a route to this host's table and point the route back at this host.
    ///
    /// A virtual host copies its parent's table first. Adding a route that is
    /// already in the table changes nothing but the back reference. Returns
    /// the route's index.
    pub fn add_route(self: &Arc<Self>, route: Arc<Route>) -> usize {
        let insertion = self.routes.update(|table| table.insert(route.clone()));
        route.set_host(self);
        match insertion {
            Insertion::Inserted(index) => {
                tracing::debug!(
                    host = ?self.name(),
                    route = %route.name(),
                    index,
                    "Route added"
                );
                index
            }
            Insertion::Present(index) => index,
        }
    }

    /// Drop every route, detaching from the parent's table if shared.
    pub fn reset_routes(&self) {
        self.routes.replace(RouteTable::new());
    }

    /// Route by name. An empty name means `"default"`.
    pub fn lookup_route(&self, name: &str) -> Option<Arc<Route>> {
        self.routes.load().lookup(name).cloned()
    }

    /// Route by pattern. `/`, `^/` and `^/$` find the empty-pattern route.
    pub fn lookup_route_by_pattern(&self, pattern: &str) -> Option<Arc<Route>> {
        self.routes.load().lookup_by_pattern(pattern).cloned()
    }

    /// Route serving `req`: the first table match, else the default route if
    /// it accepts the request.
    pub fn find_route(&self, req: &RequestInfo) -> Option<Arc<Route>> {
        self.routes.load().find(req).or_else(|| {
            self.default_route()
                .filter(|route| route.matches(req))
        })
    }

    /// Whether a request body of `mime` sent to `uri` is streamed.
    pub fn get_streaming(&self, mime: &str, uri: &str) -> bool {
        self.streams.load().is_streaming(mime, uri)
    }

    /// Set the streaming rule for `mime`. A virtual host copies its parent's
    /// rules first.
    pub fn set_streaming(&self, mime: &str, uri_prefix: Option<&str>, enabled: bool) {
        self.streams
            .update(|table| table.set(mime, uri_prefix, enabled));
    }

    fn routes_with_default(&self) -> Vec<Arc<Route>> {
        let table = self.routes.load();
        let mut routes: Vec<Arc<Route>> = table.iter().cloned().collect();
        if let Some(default) = self.default_route() {
            if !table.contains(&default) {
                routes.push(default);
            }
        }
        routes
    }

    /// Start every route, then let untraced routes inherit the trace of a
    /// standalone parent route.
    ///
    /// Routes shared with a parent host are started once.
    pub fn start(&self) -> Result<(), HostError> {
        let routes = self.routes_with_default();
        for route in &routes {
            route.start().map_err(|source| HostError::Route {
                host: self.name().unwrap_or_default(),
                source,
            })?;
        }
        for route in &routes {
            if route.inherit_trace() {
                tracing::debug!(route = %route.name(), "Route inherited parent trace");
            }
        }
        tracing::info!(host = ?self.name(), routes = routes.len(), "Host started");
        Ok(())
    }

    /// Stop every route of this host, including routes shared with a parent.
    pub fn stop(&self) {
        let routes = self.routes_with_default();
        for route in &routes {
            route.stop();
        }
        tracing::info!(host = ?self.name(), routes = routes.len(), "Host stopped");
    }
}

fn read_weak<T>(slot: &RwLock<Weak<T>>) -> Weak<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name())
            .field("vhost", &self.vhost)
            .field("routes", &self.routes)
            .field("streams", &self.streams)
            .finish_non_exhaustive()
    }
}
