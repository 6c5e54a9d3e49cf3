//! Request-processing stages.
//!
//! A stage is a named handler a route can reference. Routes call a stage's
//! `start`/`stop` hooks when their host starts and stops, and the serving
//! layer calls `process` for requests the route accepts.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::http::connection::Connection;
use crate::http::request::RequestInfo;
use crate::routing::route::{Route, RouteError};

pub const PASS_HANDLER: &str = "passHandler";

pub trait Stage: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Whether this stage wants the request. Only consulted for a route's
    /// handler list.
    fn accepts(&self, _req: &RequestInfo) -> bool {
        true
    }

    /// Called when a route using this stage starts.
    fn start(&self, _route: &Route) -> Result<(), RouteError> {
        Ok(())
    }

    /// Called when a route using this stage stops.
    fn stop(&self, _route: &Route) {}

    /// Produce the response for the connection.
    fn process(&self, conn: &mut Connection);
}

/// Completes the exchange with whatever status and body are already set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassHandler;

impl Stage for PassHandler {
    fn name(&self) -> &str {
        PASS_HANDLER
    }

    fn process(&self, conn: &mut Connection) {
        conn.finalize();
    }
}

/// Stages available to routes, by name.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Arc<DashMap<String, Arc<dyn Stage>>>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistry {
    /// A registry holding the pass handler.
    pub fn new() -> Self {
        let registry = Self {
            stages: Arc::new(DashMap::new()),
        };
        registry.register(Arc::new(PassHandler));
        registry
    }

    /// Register a stage under its own name, replacing any previous one.
    pub fn register(&self, stage: Arc<dyn Stage>) {
        tracing::debug!(stage = %stage.name(), "Stage registered");
        self.stages.insert(stage.name().to_string(), stage);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).map(|s| s.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stages.iter().map(|s| s.key().clone()).collect();
        names.sort();
        names
    }

    /// Stage for `name`, or [`RouteError::UnknownHandler`].
    pub fn require(&self, name: &str) -> Result<Arc<dyn Stage>, RouteError> {
        self.get(name)
            .ok_or_else(|| RouteError::UnknownHandler(name.to_string()))
    }
}
