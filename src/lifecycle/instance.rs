//! Server instances: one bound listener plus its HTTP accept loop.
//!
//! The lifecycle controller only talks to instances through the
//! [`ServerLauncher`] and [`ManagedServer`] traits. [`HttpLauncher`] and
//! [`ServerInstance`] are the real implementations.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ServiceConfig;
use crate::http::{HttpServer, ServePhase};
use crate::net::{self, ConnectionTracker, ListenerError};
use crate::observability::{metrics, RecordSink};

/// How long aborted connections get to unwind before the accept task itself
/// is aborted.
const ABORT_WAIT: Duration = Duration::from_secs(1);

/// Relaxed ordering is enough, only uniqueness matters.
static INSTANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(INSTANCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// How a successful stop went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Stopped accepting and every open connection finished.
    Drained,
    /// The instance had already been stopped.
    AlreadyStopped,
}

/// Errors reported while stopping an instance.
///
/// The instance is stopped regardless; these only describe how untidy it was.
#[derive(Debug, Error)]
pub enum StopError {
    /// The accept loop ended with an I/O error.
    #[error("accept loop failed: {0}")]
    Serve(#[source] std::io::Error),

    /// The accept loop task panicked or was cancelled.
    #[error("accept loop task failed: {0}")]
    Task(#[source] tokio::task::JoinError),

    /// The grace period ran out and the remaining connections were closed.
    #[error("grace period of {grace:?} elapsed, closed {abandoned} open connection(s)")]
    DeadlineExceeded { grace: Duration, abandoned: u64 },
}

/// A running server the lifecycle controller can stop.
pub trait ManagedServer: Send {
    fn id(&self) -> InstanceId;

    fn local_addr(&self) -> SocketAddr;

    /// Stop accepting, drain for at most `grace`, then close.
    ///
    /// Calling this on an already stopped server returns
    /// [`StopOutcome::AlreadyStopped`].
    fn stop(&mut self, grace: Duration) -> impl Future<Output = Result<StopOutcome, StopError>> + Send;
}

/// Creates server instances from a configuration.
pub trait ServerLauncher: Send {
    type Server: ManagedServer;

    /// Bind and start serving. Resolves as soon as the socket is bound.
    fn launch(
        &mut self,
        config: &ServiceConfig,
    ) -> impl Future<Output = Result<Self::Server, ListenerError>> + Send;
}

/// A bound listener with its accept loop running on a separate task.
///
/// Dropping a running instance starts draining without waiting for it.
#[derive(Debug)]
pub struct ServerInstance {
    id: InstanceId,
    addr: SocketAddr,
    tracker: ConnectionTracker,
    phase_tx: watch::Sender<ServePhase>,
    task: Option<JoinHandle<Result<(), std::io::Error>>>,
}

impl ServerInstance {
    /// Bind `config.server.bind_address` and start accepting in the background.
    pub async fn start(config: &ServiceConfig, sink: Arc<dyn RecordSink>) -> Result<Self, ListenerError> {
        let (listener, addr) = net::bind(&config.server.bind_address).await?;

        let id = InstanceId::next();
        let server = HttpServer::new(config, sink);
        let tracker = server.tracker();
        let (phase_tx, phase_rx) = watch::channel(ServePhase::Accepting);

        let task = tokio::spawn(async move {
            let result = server.serve(listener, phase_rx).await;
            if let Err(e) = &result {
                tracing::error!(instance = %id, error = %e, "Accept loop failed");
            }
            result
        });

        tracing::info!(instance = %id, address = %addr, "Server instance started");

        Ok(Self {
            id,
            addr,
            tracker,
            phase_tx,
            task: Some(task),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Connections accepted by this instance and not yet closed.
    pub fn open_connections(&self) -> u64 {
        self.tracker.open_count()
    }

    /// Stop accepting, wait up to `grace` for open connections, then close.
    ///
    /// When the grace period elapses every connection still open is aborted
    /// and its socket closed before this returns.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<StopOutcome, StopError> {
        let Some(mut task) = self.task.take() else {
            return Ok(StopOutcome::AlreadyStopped);
        };

        let _ = self.phase_tx.send(ServePhase::Draining);

        tracing::info!(
            instance = %self.id,
            open_connections = self.tracker.open_count(),
            grace_ms = grace.as_millis() as u64,
            "Stopping server instance"
        );

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(StopOutcome::Drained),
            Ok(Ok(Err(e))) => Err(StopError::Serve(e)),
            Ok(Err(e)) => Err(StopError::Task(e)),
            Err(_) => {
                let abandoned = self.tracker.open_count();
                let _ = self.phase_tx.send(ServePhase::Closing);

                if tokio::time::timeout(ABORT_WAIT, &mut task).await.is_err() {
                    task.abort();
                    let _ = task.await;
                }

                tracing::warn!(
                    instance = %self.id,
                    abandoned,
                    "Grace period elapsed, connections closed"
                );
                metrics::record_forced_close();
                Err(StopError::DeadlineExceeded { grace, abandoned })
            }
        }
    }
}

impl Drop for ServerInstance {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.phase_tx.send(ServePhase::Draining);
        }
    }
}

impl ManagedServer for ServerInstance {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn stop(&mut self, grace: Duration) -> Result<StopOutcome, StopError> {
        self.shutdown(grace).await
    }
}

/// Launches [`ServerInstance`]s that write records to a shared sink.
#[derive(Clone)]
pub struct HttpLauncher {
    sink: Arc<dyn RecordSink>,
}

impl HttpLauncher {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }
}

impl ServerLauncher for HttpLauncher {
    type Server = ServerInstance;

    async fn launch(&mut self, config: &ServiceConfig) -> Result<ServerInstance, ListenerError> {
        ServerInstance::start(config, Arc::clone(&self.sink)).await
    }
}
