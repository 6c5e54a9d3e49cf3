//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Route selected
//!     → limits.rs (URI length, body size)
//!     → request admitted or rejected with 413/414
//! ```
//!
//! # Design Decisions
//! - Limits travel with the route, not the connection
//! - Authentication policy is consumed by name only (see `routing::route::Auth`)

pub mod limits;

pub use limits::Limits;
