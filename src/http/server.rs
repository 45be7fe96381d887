//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the endpoint handler
//! - Wire up middleware (tracing, request ID, timeout)
//! - Run the accept loop on a bound listener, one task per connection
//! - Drain or abort those connection tasks when the owning instance stops
//!
//! The connection tasks live in a `JoinSet` owned by the accept loop, so an
//! instance that stops never leaves a socket serving behind it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::handler::{endpoint_handler, EndpointState};
use crate::net::{ConnectionGuard, ConnectionTracker};
use crate::observability::RecordSink;

/// Pause after a failed accept, so a full fd table doesn't spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// What the owner of a running server wants from it.
///
/// Phases only move forward: `Accepting → Draining → Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServePhase {
    /// Accept and serve connections.
    Accepting,
    /// Close the listener and let open connections finish their request.
    Draining,
    /// Abort every connection still open.
    Closing,
}

/// HTTP server for one server instance.
pub struct HttpServer {
    router: Router,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ServiceConfig, sink: Arc<dyn RecordSink>) -> Self {
        let state = EndpointState {
            sink,
            config: Arc::new(config.endpoint.clone()),
        };

        Self {
            router: Self::build_router(config, state),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: EndpointState) -> Router {
        Router::new()
            .route("/{status}", get(endpoint_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Tracker observing this server's open connections.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// The router, for driving requests without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve connections on `listener` until `phase` leaves
    /// [`ServePhase::Accepting`].
    ///
    /// The listener is closed as soon as draining starts. Returns once every
    /// connection has finished, or right after they were all aborted when
    /// `phase` reached [`ServePhase::Closing`].
    pub async fn serve(
        self,
        listener: TcpListener,
        mut phase: watch::Receiver<ServePhase>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::debug!(address = %addr, "HTTP server accepting");

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::warn!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                        }
                        let guard = self.tracker.track(peer);
                        connections.spawn(serve_connection(
                            self.router.clone(),
                            stream,
                            peer,
                            guard,
                            phase.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(address = %addr, error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                _ = reached(&mut phase, ServePhase::Draining) => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        tracing::debug!(
            address = %addr,
            open_connections = self.tracker.open_count(),
            "HTTP server draining"
        );

        // Once the owner is gone nobody can ask for Closing any more.
        let mut owner_gone = false;
        loop {
            tokio::select! {
                joined = connections.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
                forced = reached(&mut phase, ServePhase::Closing), if !owner_gone => {
                    if forced {
                        tracing::debug!(
                            address = %addr,
                            open_connections = self.tracker.open_count(),
                            "Aborting open connections"
                        );
                        connections.shutdown().await;
                        break;
                    }
                    owner_gone = true;
                }
            }
        }

        tracing::debug!(address = %addr, "HTTP server closed");
        Ok(())
    }
}

/// Resolves once `phase` is at or past `target`. `false` means the sender
/// was dropped first.
async fn reached(phase: &mut watch::Receiver<ServePhase>, target: ServePhase) -> bool {
    phase.wait_for(|current| *current >= target).await.is_ok()
}

/// Drive one connection until it closes, switching it to graceful shutdown
/// when draining starts.
async fn serve_connection(
    router: Router,
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
    mut phase: watch::Receiver<ServePhase>,
) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let connection =
        builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                }
                break;
            }
            _ = reached(&mut phase, ServePhase::Draining), if !draining => {
                connection.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }

    drop(guard);
}
