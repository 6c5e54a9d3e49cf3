//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint config (name, address, secure)
//!     → endpoint.rs (bind listener)
//!     → Hand off to HTTP layer, tagged with the endpoint name
//! ```
//!
//! # Design Decisions
//! - Hosts reference endpoints, they never own them
//! - One listener per endpoint

pub mod endpoint;

pub use endpoint::{Endpoint, ListenerError};
