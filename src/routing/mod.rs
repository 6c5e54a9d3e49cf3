//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration:
//!     RouteBuilder → Route (pattern compiled, start segment derived)
//!     → Host::add_route → table.rs (ordered insert, group links)
//!
//! Incoming Request (host, method, path, headers):
//!     → table.rs + matcher.rs (ordered walk, group skipping)
//!     → Return: first matching Route, or None
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (literal prefix matching only)
//! - Deterministic: same table and request always match the same route
//! - First match wins, the catch-all route is kept last

pub mod condition;
pub mod matcher;
pub mod report;
pub mod route;
pub mod table;
pub mod target;

pub use route::{Route, RouteBuilder, RouteError};
pub use table::RouteTable;
pub use target::Target;
