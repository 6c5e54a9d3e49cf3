//! Listening endpoints.
//!
//! # Responsibilities
//! - Describe a named listening address (plain or secure)
//! - Bind the endpoint's TCP listener
//!
//! # Design Decisions
//! - Endpoints are owned by the server context; hosts only hold weak references
//! - TLS termination happens in front of the engine; `secure` is a label that
//!   routes and hosts can test

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for endpoint operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address does not parse.
    #[error("Invalid address for endpoint {endpoint}: {address}")]
    Address { endpoint: String, address: String },

    /// Failed to bind to address.
    #[error("Failed to bind endpoint {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
}

/// A named address the server accepts connections on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    address: String,
    secure: bool,
}

impl Endpoint {
    /// Create an endpoint description.
    pub fn new(name: impl Into<String>, address: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// True if connections on this endpoint arrived over TLS.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Parse the configured address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.address.parse().map_err(|_| ListenerError::Address {
            endpoint: self.name.clone(),
            address: self.address.clone(),
        })
    }

    /// Bind a TCP listener for this endpoint.
    pub async fn bind(&self) -> Result<TcpListener, ListenerError> {
        let addr = self.socket_addr()?;
        let listener = TcpListener::bind(addr).await.map_err(|source| ListenerError::Bind {
            endpoint: self.name.clone(),
            source,
        })?;

        tracing::info!(
            endpoint = %self.name,
            address = %addr,
            secure = self.secure,
            "Endpoint bound"
        );
        Ok(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address() {
        let ep = Endpoint::new("web", "not-an-address", false);
        assert!(matches!(ep.socket_addr(), Err(ListenerError::Address { .. })));
    }

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let ep = Endpoint::new("web", "127.0.0.1:0", false);
        let listener = ep.bind().await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
