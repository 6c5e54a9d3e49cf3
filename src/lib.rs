//! Virtual-host and route resolution engine for an embedded HTTP server.

pub mod action;
pub mod admin;
pub mod config;
pub mod context;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use action::{action, Action, ActionError, ActionRegistry};
pub use config::schema::ServerConfig;
pub use context::ServerContext;
pub use host::{Host, HostError};
pub use http::{Connection, HttpServer};
pub use lifecycle::Shutdown;
pub use routing::{Route, RouteTable};
