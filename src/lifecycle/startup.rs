//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Create the signal channel and hook up its producers
//! - Spawn the lifecycle controller and wait for its completion latch
//!
//! # Design Decisions
//! - Fail fast: any startup error here is fatal
//! - Signal handlers are installed before the first instance binds
//! - A bind failure is not a startup error; the controller owns that policy

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::{ConfigSource, ServiceConfig};
use crate::lifecycle::controller::LifecycleController;
use crate::lifecycle::instance::HttpLauncher;
use crate::lifecycle::shutdown::{completion_latch, Completion};
use crate::lifecycle::signals::forward_os_signals;
use crate::observability::{metrics, RecordSink};

/// Errors that prevent the service from starting at all.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    /// The metrics address did not parse.
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    /// The Prometheus exporter could not start.
    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The config file watcher could not start.
    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// Run the service until a terminate request (or the bind failure policy)
/// stops it.
pub async fn run_service(
    source: ConfigSource,
    config: ServiceConfig,
    sink: Arc<dyn RecordSink>,
) -> Result<Completion, StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let (tx, rx) = mpsc::channel(config.lifecycle.channel_capacity);
    let forwarder = forward_os_signals(tx.clone()).map_err(StartupError::Signals)?;

    // Kept alive until shutdown; dropping it stops the watch.
    let _watcher = match (config.lifecycle.watch_config, source.path()) {
        (true, Some(path)) => Some(ConfigWatcher::new(path, tx.clone()).run()?),
        _ => None,
    };
    drop(tx);

    let controller = LifecycleController::new(HttpLauncher::new(sink), source, config, rx);
    let (latch, waiter) = completion_latch();
    tokio::spawn(controller.run(latch));

    let completion = waiter.wait().await;
    forwarder.abort();

    Ok(completion)
}
