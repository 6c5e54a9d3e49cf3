//! Route definition.
//!
//! # Responsibilities
//! - Describe one matching unit: pattern, target, conditions, handlers
//! - Derive the literal start segment used to group routes in a table
//! - Run handler start/stop hooks and inherit trace settings
//!
//! # Design Decisions
//! - Routes are built once and shared via `Arc`; only the owning-host back
//!   reference, the inherited trace and the started flag change after build
//! - The owning host is a weak reference; tables own routes, routes never own hosts
//! - Grouping pointers live in the route table, not here, so tables copied for
//!   a virtual host keep their own index

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use axum::http::Method;
use thiserror::Error;

use crate::host::Host;
use crate::http::request::RequestInfo;
use crate::http::stage::Stage;
use crate::observability::tracing::RouteTrace;
use crate::routing::condition::Condition;
use crate::routing::matcher::PathPattern;
use crate::routing::target::Target;
use crate::security::Limits;

/// Name an empty route name resolves to.
pub const DEFAULT_ROUTE_NAME: &str = "default";

/// Errors raised while building or starting routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Pattern uses regex features the matcher does not support.
    #[error("Unsupported route pattern: {pattern}")]
    UnsupportedPattern { pattern: String },

    #[error("Invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Invalid condition {condition:?}: {reason}")]
    InvalidCondition { condition: String, reason: String },

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// No stage registered under this name.
    #[error("Unknown handler: {0}")]
    UnknownHandler(String),

    #[error("Route {route} names unknown parent route {parent}")]
    UnknownParent { route: String, parent: String },

    /// A handler refused to start for this route.
    #[error("Handler {stage} failed to start for route {route}: {reason}")]
    Stage {
        route: String,
        stage: String,
        reason: String,
    },
}

/// Authentication policy consulted for a route. Only the type name is used here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    auth_type: Option<String>,
}

impl Auth {
    pub fn new(auth_type: impl Into<String>) -> Self {
        Self {
            auth_type: Some(auth_type.into()),
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.auth_type.as_deref()
    }
}

/// Resolve an empty route name to `"default"`.
pub fn normalize_route_name(name: &str) -> &str {
    if name.is_empty() {
        DEFAULT_ROUTE_NAME
    } else {
        name
    }
}

/// Map every spelling of the root pattern to the canonical empty pattern.
pub fn normalize_pattern(pattern: &str) -> &str {
    match pattern {
        "/" | "^/" | "^/$" => "",
        other => other,
    }
}

/// Literal first path segment of a pattern's literal prefix.
///
/// `"/app/(.*)"` has prefix `"/app/"` and segment `"/app"`. A bare `"/"` has no segment.
pub fn start_segment(start_with: &str) -> String {
    let segment = match start_with.strip_prefix('/') {
        Some(rest) => match rest.find('/') {
            Some(end) => &start_with[..end + 1],
            None => start_with,
        },
        None => match start_with.find('/') {
            Some(end) => &start_with[..end],
            None => start_with,
        },
    };
    if segment == "/" {
        String::new()
    } else {
        segment.to_string()
    }
}

/// A configured route.
pub struct Route {
    name: String,
    pattern: String,
    path_pattern: PathPattern,
    start_with: String,
    start_segment: String,
    target: Target,
    methods: Option<Vec<Method>>,
    conditions: Vec<Arc<dyn Condition>>,
    handler: Option<Arc<dyn Stage>>,
    handlers: Vec<Arc<dyn Stage>>,
    extensions: BTreeMap<String, Arc<dyn Stage>>,
    auth: Auth,
    parent: Option<Arc<Route>>,
    limits: Limits,
    home: PathBuf,
    documents: PathBuf,
    source: Option<String>,
    template: Option<String>,
    indexes: Vec<String>,
    hidden: bool,
    grouped: bool,
    cache_lifespan: Option<Duration>,

    trace: ArcSwapOption<RouteTrace>,
    host: RwLock<Weak<Host>>,
    started: AtomicBool,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("start_segment", &self.start_segment)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// Start building a route.
    pub fn builder(name: impl Into<String>) -> RouteBuilder {
        RouteBuilder::new(name)
    }

    /// Start building a route that inherits handlers, auth, limits and
    /// directories from `parent`. Pattern, conditions and trace are not copied.
    pub fn inherit(name: impl Into<String>, parent: &Arc<Route>) -> RouteBuilder {
        let mut builder = RouteBuilder::new(name);
        builder.methods = parent.methods.clone();
        builder.handler = parent.handler.clone();
        builder.handlers = parent.handlers.clone();
        builder.extensions = parent.extensions.clone();
        builder.auth = parent.auth.clone();
        builder.limits = parent.limits.clone();
        builder.home = parent.home.clone();
        builder.documents = parent.documents.clone();
        builder.indexes = parent.indexes.clone();
        builder.parent = Some(parent.clone());
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pattern as stored, with root spellings normalized to `""`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True for the catch-all route.
    pub fn has_empty_pattern(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn path_pattern(&self) -> &PathPattern {
        &self.path_pattern
    }

    /// Literal prefix every matching path starts with.
    pub fn start_with(&self) -> &str {
        &self.start_with
    }

    /// Literal first segment used to group routes.
    pub fn start_segment(&self) -> &str {
        &self.start_segment
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Allowed methods, `None` for any.
    pub fn methods(&self) -> Option<&[Method]> {
        self.methods.as_deref()
    }

    pub fn conditions(&self) -> &[Arc<dyn Condition>] {
        &self.conditions
    }

    pub fn handler(&self) -> Option<&Arc<dyn Stage>> {
        self.handler.as_ref()
    }

    pub fn handlers(&self) -> &[Arc<dyn Stage>] {
        &self.handlers
    }

    pub fn extensions(&self) -> &BTreeMap<String, Arc<dyn Stage>> {
        &self.extensions
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn parent(&self) -> Option<&Arc<Route>> {
        self.parent.as_ref()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn documents(&self) -> &Path {
        &self.documents
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    /// Hidden routes are left out of the route report.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Grouped routes belong to a route set and do not pass trace settings on.
    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    pub fn cache_lifespan(&self) -> Option<Duration> {
        self.cache_lifespan
    }

    pub fn trace(&self) -> Option<Arc<RouteTrace>> {
        self.trace.load_full()
    }

    pub fn set_trace(&self, trace: Option<RouteTrace>) {
        self.trace.store(trace.map(Arc::new));
    }

    /// Host whose table this route was last added to.
    pub fn host(&self) -> Option<Arc<Host>> {
        self.host
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    pub(crate) fn set_host(&self, host: &Arc<Host>) {
        *self.host.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(host);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Distinct stages referenced by this route, in declaration order.
    pub fn stages(&self) -> Vec<Arc<dyn Stage>> {
        let mut stages: Vec<Arc<dyn Stage>> = Vec::new();
        let all = self
            .handler
            .iter()
            .chain(self.handlers.iter())
            .chain(self.extensions.values());
        for stage in all {
            if !stages.iter().any(|s| Arc::ptr_eq(s, stage)) {
                stages.push(stage.clone());
            }
        }
        stages
    }

    /// Run the start hook of every stage this route uses.
    pub fn start(&self) -> Result<(), RouteError> {
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        for stage in self.stages() {
            stage.start(self)?;
        }
        self.started.store(true, Ordering::Release);
        tracing::debug!(route = %self.name, "Route started");
        Ok(())
    }

    /// Run the stop hook of every stage this route uses.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        for stage in self.stages() {
            stage.stop(self);
        }
        tracing::debug!(route = %self.name, "Route stopped");
    }

    /// Take the parent route's trace if this route has none and the parent is
    /// a standalone (ungrouped) route. Returns true if a trace was inherited.
    pub fn inherit_trace(&self) -> bool {
        if self.trace.load().is_some() {
            return false;
        }
        let Some(parent) = &self.parent else {
            return false;
        };
        if parent.grouped {
            return false;
        }
        match parent.trace() {
            Some(trace) => {
                self.trace.store(Some(trace));
                true
            }
            None => false,
        }
    }

    /// Pick the stage that processes a request on this route: the explicit
    /// handler, else the handler for the path's extension, else the first
    /// listed handler that accepts the request.
    pub fn select_handler(&self, req: &RequestInfo) -> Option<Arc<dyn Stage>> {
        if let Some(handler) = &self.handler {
            return Some(handler.clone());
        }
        if let Some(handler) = req.extension().and_then(|ext| self.extensions.get(ext)) {
            return Some(handler.clone());
        }
        self.handlers.iter().find(|h| h.accepts(req)).cloned()
    }
}

/// Builder for [`Route`].
pub struct RouteBuilder {
    name: String,
    pattern: String,
    target: Target,
    methods: Option<Vec<Method>>,
    conditions: Vec<Arc<dyn Condition>>,
    handler: Option<Arc<dyn Stage>>,
    handlers: Vec<Arc<dyn Stage>>,
    extensions: BTreeMap<String, Arc<dyn Stage>>,
    auth: Auth,
    trace: Option<RouteTrace>,
    parent: Option<Arc<Route>>,
    limits: Limits,
    home: PathBuf,
    documents: PathBuf,
    source: Option<String>,
    template: Option<String>,
    indexes: Vec<String>,
    hidden: bool,
    grouped: bool,
    cache_lifespan: Option<Duration>,
}

impl RouteBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: String::new(),
            target: Target::default(),
            methods: None,
            conditions: Vec::new(),
            handler: None,
            handlers: Vec::new(),
            extensions: BTreeMap::new(),
            auth: Auth::default(),
            trace: None,
            parent: None,
            limits: Limits::default(),
            home: PathBuf::from("."),
            documents: PathBuf::from("."),
            source: None,
            template: None,
            indexes: Vec::new(),
            hidden: false,
            grouped: false,
            cache_lifespan: None,
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = if methods.is_empty() { None } else { Some(methods) };
        self
    }

    pub fn condition(mut self, condition: Box<dyn Condition>) -> Self {
        self.conditions.push(Arc::from(condition));
        self
    }

    pub fn handler(mut self, handler: Arc<dyn Stage>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn add_handler(mut self, handler: Arc<dyn Stage>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn extension(mut self, ext: impl Into<String>, handler: Arc<dyn Stage>) -> Self {
        let ext = ext.into();
        self.extensions
            .insert(ext.trim_start_matches('.').to_string(), handler);
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn trace(mut self, trace: RouteTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn documents(mut self, documents: impl Into<PathBuf>) -> Self {
        self.documents = documents.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.indexes.push(index.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn grouped(mut self, grouped: bool) -> Self {
        self.grouped = grouped;
        self
    }

    pub fn cache_lifespan(mut self, lifespan: Duration) -> Self {
        self.cache_lifespan = Some(lifespan);
        self
    }

    /// Validate the pattern and produce the shared route.
    pub fn build(self) -> Result<Arc<Route>, RouteError> {
        let pattern = normalize_pattern(&self.pattern).to_string();
        let (path_pattern, start_with) = PathPattern::parse(&pattern)?;
        let start_segment = start_segment(&start_with);

        Ok(Arc::new(Route {
            name: self.name,
            pattern,
            path_pattern,
            start_with,
            start_segment,
            target: self.target,
            methods: self.methods,
            conditions: self.conditions,
            handler: self.handler,
            handlers: self.handlers,
            extensions: self.extensions,
            auth: self.auth,
            parent: self.parent,
            limits: self.limits,
            home: self.home,
            documents: self.documents,
            source: self.source,
            template: self.template,
            indexes: self.indexes,
            hidden: self.hidden,
            grouped: self.grouped,
            cache_lifespan: self.cache_lifespan,
            trace: ArcSwapOption::from(self.trace.map(Arc::new)),
            host: RwLock::new(Weak::new()),
            started: AtomicBool::new(false),
        }))
    }
}
