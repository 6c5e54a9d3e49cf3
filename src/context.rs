//! Server-wide configuration context.
//!
//! # Responsibilities
//! - Own every host, endpoint and stage of one configuration
//! - Designate the default host and build it on demand
//! - Install the action handler and register actions
//! - Start and stop all hosts
//!
//! # Design Decisions
//! - Passed explicitly; there is no process-wide default host
//! - A reload builds a fresh context and swaps it in whole; actions can be
//!   carried over by sharing the `ActionRegistry`

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;

use crate::action::{Action, ActionError, ActionHandler, ActionRegistry};
use crate::host::{Host, HostError, HostRegistry};
use crate::http::stage::{Stage, StageRegistry};
use crate::net::Endpoint;
use crate::routing::report;
use crate::routing::route::{Route, RouteError, DEFAULT_ROUTE_NAME};
use crate::security::Limits;

/// Default bound on how long a host cache keeps a response.
pub const DEFAULT_CACHE_MAX_DURATION: Duration = Duration::from_secs(86_400);

#[derive(Debug)]
pub struct ServerContext {
    hosts: HostRegistry,
    stages: StageRegistry,
    action_handler: ArcSwapOption<ActionHandler>,
    endpoints: RwLock<Vec<Arc<Endpoint>>>,
    limits: Limits,
    cache_max_duration: Duration,
    setup: Mutex<()>,
}

impl Default for ServerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerContext {
    pub fn new() -> Self {
        Self::with_settings(Limits::default(), DEFAULT_CACHE_MAX_DURATION)
    }

    pub fn with_settings(limits: Limits, cache_max_duration: Duration) -> Self {
        Self {
            hosts: HostRegistry::new(),
            stages: StageRegistry::new(),
            action_handler: ArcSwapOption::empty(),
            endpoints: RwLock::new(Vec::new()),
            limits,
            cache_max_duration,
            setup: Mutex::new(()),
        }
    }

    /// Server-wide limits, given to the default route.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn cache_max_duration(&self) -> Duration {
        self.cache_max_duration
    }

    pub fn hosts(&self) -> &HostRegistry {
        &self.hosts
    }

    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    pub fn create_host(&self) -> Result<Arc<Host>, HostError> {
        Host::create(self)
    }

    pub fn clone_host(&self, parent: &Arc<Host>) -> Result<Arc<Host>, HostError> {
        Host::clone_from(self, parent)
    }

    /// The default host, created on first call with a `"default"` route that
    /// carries the server limits. The route is installed as the host's
    /// default route, not added to its table.
    pub fn create_default_host(&self) -> Result<Arc<Host>, HostError> {
        let _guard = self.setup.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(host) = self.hosts.default_host() {
            return Ok(host);
        }
        let host = Host::create(self)?;
        let route = Route::builder(DEFAULT_ROUTE_NAME)
            .limits(self.limits.clone())
            .build()
            .map_err(|source| HostError::Route {
                host: String::new(),
                source,
            })?;
        host.set_default_route(Some(route));
        self.hosts.set_default_host(Some(host.clone()));
        tracing::debug!("Default host created");
        Ok(host)
    }

    pub fn default_host(&self) -> Option<Arc<Host>> {
        self.hosts.default_host()
    }

    pub fn set_default_host(&self, host: &Arc<Host>) {
        self.hosts.set_default_host(Some(host.clone()));
    }

    fn host_or_default(&self, host: Option<&Arc<Host>>) -> Option<Arc<Host>> {
        host.cloned().or_else(|| self.default_host())
    }

    /// Route by name on `host`, or on the default host when none is given.
    pub fn lookup_route(&self, host: Option<&Arc<Host>>, name: &str) -> Option<Arc<Route>> {
        self.host_or_default(host)?.lookup_route(name)
    }

    /// Route by pattern on `host`, or on the default host when none is given.
    pub fn lookup_route_by_pattern(
        &self,
        host: Option<&Arc<Host>>,
        pattern: &str,
    ) -> Option<Arc<Route>> {
        self.host_or_default(host)?.lookup_route_by_pattern(pattern)
    }

    pub fn default_route(&self, host: Option<&Arc<Host>>) -> Option<Arc<Route>> {
        self.host_or_default(host)?.default_route()
    }

    /// Install the action handler with a fresh registry. Idempotent.
    pub fn open_action_handler(&self) -> Arc<ActionHandler> {
        self.open_action_handler_with(ActionRegistry::new())
    }

    /// Install the action handler over an existing registry. If a handler is
    /// already installed it is kept and `registry` is ignored.
    pub fn open_action_handler_with(&self, registry: ActionRegistry) -> Arc<ActionHandler> {
        let _guard = self.setup.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handler) = self.action_handler.load_full() {
            return handler;
        }
        let handler = Arc::new(ActionHandler::new(registry));
        self.stages.register(handler.clone());
        self.action_handler.store(Some(handler.clone()));
        handler
    }

    pub fn action_handler(&self) -> Option<Arc<ActionHandler>> {
        self.action_handler.load_full()
    }

    /// Register `action` for requests whose path info is exactly `name`.
    ///
    /// Fails, after logging, if the action handler was never opened.
    pub fn define_action(&self, name: &str, action: Arc<dyn Action>) -> Result<(), ActionError> {
        let Some(handler) = self.action_handler.load_full() else {
            tracing::error!(action = %name, "Action handler is not installed");
            return Err(ActionError::HandlerNotInstalled);
        };
        handler.registry().define(name, action);
        Ok(())
    }

    pub fn add_endpoint(&self, endpoint: Endpoint) -> Arc<Endpoint> {
        let endpoint = Arc::new(endpoint);
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(endpoint.clone());
        endpoint
    }

    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }

    /// Route dump for `host`, or for the default host when none is given.
    pub fn log_routes(&self, host: Option<&Arc<Host>>, full: bool) -> Option<String> {
        let host = self.host_or_default(host)?;
        Some(report::log_routes(&host, full))
    }

    /// Start every host in creation order. Stops at the first failure.
    pub fn start(&self) -> Result<(), HostError> {
        for host in self.hosts.hosts() {
            host.start()?;
        }
        Ok(())
    }

    /// Stop every host and refuse new ones.
    pub fn stop(&self) {
        self.hosts.close();
        for host in self.hosts.hosts() {
            host.stop();
        }
    }

    /// Resolve a handler name against the registered stages.
    pub fn stage(&self, name: &str) -> Result<Arc<dyn Stage>, RouteError> {
        self.stages.require(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::action;

    #[test]
    fn test_create_default_host_idempotent() {
        let limits = Limits {
            max_body_size: 1024,
            ..Limits::default()
        };
        let ctx = ServerContext::with_settings(limits, Duration::from_secs(5));
        let first = ctx.create_default_host().unwrap();
        let second = ctx.create_default_host().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.hosts().len(), 1);

        let route = first.default_route().unwrap();
        assert_eq!(route.name(), "default");
        assert!(route.has_empty_pattern());
        assert_eq!(route.limits().max_body_size, 1024);
        // Not in the table.
        assert!(first.route_table().is_empty());
        assert_eq!(first.cache().max_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_lookup_falls_back_to_default_host() {
        let ctx = ServerContext::new();
        assert!(ctx.lookup_route(None, "api").is_none());

        let host = ctx.create_default_host().unwrap();
        host.add_route(Route::builder("api").pattern("^/api").build().unwrap());
        let other = ctx.create_host().unwrap();

        assert_eq!(ctx.lookup_route(None, "api").unwrap().name(), "api");
        assert!(ctx.lookup_route(Some(&other), "api").is_none());
        assert!(ctx.lookup_route_by_pattern(None, "^/api").is_some());
        assert_eq!(ctx.default_route(None).unwrap().name(), "default");
        assert!(ctx.default_route(Some(&other)).is_none());
    }

    #[test]
    fn test_define_action_without_handler() {
        let ctx = ServerContext::new();
        let err = ctx.define_action("/a", action(|_| Ok(()))).unwrap_err();
        assert!(matches!(err, ActionError::HandlerNotInstalled));
    }

    #[test]
    fn test_open_action_handler_idempotent() {
        let ctx = ServerContext::new();
        let first = ctx.open_action_handler();
        let second = ctx.open_action_handler();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.stage("actionHandler").unwrap().name(), "actionHandler");

        ctx.define_action("/a", action(|_| Ok(()))).unwrap();
        assert!(first.registry().contains("/a"));
    }

    #[test]
    fn test_shared_registry_across_contexts() {
        let registry = ActionRegistry::new();
        let old = ServerContext::new();
        old.open_action_handler_with(registry.clone());
        old.define_action("/kept", action(|_| Ok(()))).unwrap();

        let new = ServerContext::new();
        let handler = new.open_action_handler_with(registry);
        assert!(handler.registry().contains("/kept"));
    }

    #[test]
    fn test_endpoints() {
        let ctx = ServerContext::new();
        let ep = ctx.add_endpoint(Endpoint::new("main", "127.0.0.1:0", false));
        let host = ctx.create_default_host().unwrap();
        host.set_default_endpoint(&ep);
        assert!(Arc::ptr_eq(&ctx.endpoint("main").unwrap(), &ep));
        assert!(Arc::ptr_eq(&host.default_endpoint().unwrap(), &ep));
        assert!(ctx.endpoint("other").is_none());
    }

    #[test]
    fn test_resolve_host() {
        let ctx = ServerContext::new();
        let default = ctx.create_default_host().unwrap();
        let api = ctx.clone_host(&default).unwrap();
        api.set_name("api.example.com");

        let resolved = ctx.hosts().resolve(Some("API.example.com:8080")).unwrap();
        assert!(Arc::ptr_eq(&resolved, &api));
        let resolved = ctx.hosts().resolve(Some("unknown.example.com")).unwrap();
        assert!(Arc::ptr_eq(&resolved, &default));
        let resolved = ctx.hosts().resolve(None).unwrap();
        assert!(Arc::ptr_eq(&resolved, &default));
    }

    #[test]
    fn test_log_routes_uses_default_host() {
        let ctx = ServerContext::new();
        assert!(ctx.log_routes(None, false).is_none());
        ctx.create_default_host().unwrap();
        assert!(ctx.log_routes(None, false).unwrap().contains("default"));
    }
}
