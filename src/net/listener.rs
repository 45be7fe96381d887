//! TCP listener binding.
//!
//! # Responsibilities
//! - Parse and bind the configured address
//! - Surface bind failures to the caller as typed errors
//!
//! Accepting is left to the HTTP server that takes ownership of the
//! returned listener.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address is not a socket address.
    #[error("Invalid bind address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },
}

/// Bind a TCP listener on `bind_address`.
///
/// Returns the listener with the address it actually bound (which differs
/// from the requested one for port 0). Nothing is accepted yet.
pub async fn bind(bind_address: &str) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|source| ListenerError::InvalidAddress {
            address: bind_address.to_string(),
            source,
        })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { address: addr, source })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { address: addr, source })?;

    tracing::debug!(address = %local_addr, "Listener bound");

    Ok((listener, local_addr))
}
