//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection on an endpoint
//!     → server.rs (Axum setup, request ID, timeout, backpressure)
//!     → request.rs (host identity, method, path, headers)
//!     → [host resolution + route matching]
//!     → connection.rs (request-scoped exchange)
//!     → pipeline.rs (target: redirect, write or run a stage)
//!     → stage.rs (handler processes the connection)
//!     → Send to client
//! ```

pub mod connection;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod stage;

pub use connection::{Connection, ConnectionId};
pub use request::{RequestInfo, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError, ServerState};
pub use stage::{Stage, StageRegistry};
