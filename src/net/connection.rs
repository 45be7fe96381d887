//! Connection tracking for one server instance.
//!
//! # Responsibilities
//! - Give each accepted connection a unique ID for tracing
//! - Count connections that are still open, for drain reporting
//!
//! Every connection task holds a [`ConnectionGuard`] until its socket is
//! closed, whether it finished on its own or was aborted after the grace
//! period.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts open connections of one server instance.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted connection. Returns a guard that decrements on drop.
    pub fn track(&self, peer: SocketAddr) -> ConnectionGuard {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_open_connections(now);

        let id = ConnectionId::next();
        tracing::trace!(connection_id = %id, peer = %peer, "Connection opened");

        ConnectionGuard {
            open: Arc::clone(&self.open),
            id,
        }
    }

    /// Connections accepted and not yet closed.
    pub fn open_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let now = self.open.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_open_connections(now);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
