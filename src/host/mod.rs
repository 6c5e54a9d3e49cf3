//! Hosts, virtual hosts and their shared services.
//!
//! # Data Flow
//! ```text
//! Configuration:
//!     ServerContext::create_default_host / Host::create
//!     → Host::clone_from (virtual host, tables shared with parent)
//!     → add_route / set_streaming (first write copies the parent's table)
//!
//! Request:
//!     Host header → registry.rs (resolve host)
//!     → Host::find_route → Host::get_streaming → cache.rs
//! ```

pub mod cache;
pub mod cow;
#[allow(clippy::module_inception)]
mod host;
pub mod registry;
pub mod streaming;

pub use cache::{CachedResponse, ResponseCache};
pub use host::{Host, HostError};
pub use registry::HostRegistry;
pub use streaming::{StreamRule, StreamingTable};
