//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to [`SignalEvent`]s
//! - Queue events on the channel the lifecycle controller consumes
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The channel is created by the caller and injected, never global
//! - Handler installation errors are returned, not panicked on
//! - SIGHUP triggers a restart, not shutdown

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An external lifecycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// Restart the server instance (SIGHUP, config file change).
    Reload,
    /// Stop for good (SIGINT, SIGTERM).
    Terminate,
}

impl SignalEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalEvent::Reload => "reload",
            SignalEvent::Terminate => "terminate",
        }
    }
}

/// Install OS signal handlers and forward them into `events`.
///
/// Handlers are installed before this returns, so a signal arriving right
/// after is not lost. The forwarding task ends once the receiving side of
/// `events` is dropped.
#[cfg(unix)]
pub fn forward_os_signals(events: mpsc::Sender<SignalEvent>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP");
                    SignalEvent::Reload
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT");
                    SignalEvent::Terminate
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM");
                    SignalEvent::Terminate
                }
            };

            if events.send(event).await.is_err() {
                tracing::debug!("Signal channel closed, signal forwarder exiting");
                break;
            }
        }
    }))
}

/// Install OS signal handlers and forward them into `events`.
///
/// Only Ctrl+C is available off unix; it maps to [`SignalEvent::Terminate`].
#[cfg(not(unix))]
pub fn forward_os_signals(events: mpsc::Sender<SignalEvent>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                break;
            }
            tracing::info!("Received Ctrl+C");
            if events.send(SignalEvent::Terminate).await.is_err() {
                break;
            }
        }
    }))
}
