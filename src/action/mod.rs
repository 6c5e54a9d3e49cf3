//! Native request handlers.
//!
//! # Data Flow
//! ```text
//! ServerContext::define_action(path, action) → registry.rs
//!
//! Request on a route whose handler is "actionHandler"
//!     → handler.rs (exact path lookup)
//!     → Action::run(conn), or 404 "Cannot find action: <path>"
//! ```

pub mod handler;
pub mod registry;

pub use handler::{ActionHandler, ACTION_HANDLER};
pub use registry::{action, Action, ActionError, ActionRegistry};
