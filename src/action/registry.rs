//! Registry of native request handlers ("actions") keyed by request path.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use dashmap::DashMap;
use thiserror::Error;

use crate::http::connection::Connection;

#[derive(Debug, Error)]
pub enum ActionError {
    /// Actions were defined before the action handler was opened.
    #[error("Action handler is not installed")]
    HandlerNotInstalled,

    /// An action failed; the status and message become the response.
    #[error("{message}")]
    Failed { status: StatusCode, message: String },
}

impl ActionError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ActionError::Failed {
            status,
            message: message.into(),
        }
    }

    /// Status the failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::HandlerNotInstalled => StatusCode::INTERNAL_SERVER_ERROR,
            ActionError::Failed { status, .. } => *status,
        }
    }
}

/// A native function serving one request path.
///
/// The action writes the response on the connection. It may finalize it; if
/// it does not, the action handler does.
pub trait Action: Send + Sync {
    fn run(&self, conn: &mut Connection) -> Result<(), ActionError>;
}

impl<F> Action for F
where
    F: Fn(&mut Connection) -> Result<(), ActionError> + Send + Sync,
{
    fn run(&self, conn: &mut Connection) -> Result<(), ActionError> {
        self(conn)
    }
}

/// Wrap a closure as a shareable action.
pub fn action<F>(f: F) -> Arc<dyn Action>
where
    F: Fn(&mut Connection) -> Result<(), ActionError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Concurrent path -> action map.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: Arc<DashMap<String, Arc<dyn Action>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` under the exact path `name`, replacing any previous one.
    pub fn define(&self, name: impl Into<String>, action: Arc<dyn Action>) {
        let name = name.into();
        tracing::debug!(action = %name, "Action defined");
        self.actions.insert(name, action);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).map(|a| a.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered paths, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.iter().map(|a| a.key().clone()).collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
