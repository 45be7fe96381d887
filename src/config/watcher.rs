//! Configuration file watcher for hot reload.
//!
//! File changes are not applied here. They are turned into
//! [`SignalEvent::Reload`] and queued on the same channel SIGHUP uses, so the
//! lifecycle controller sees one ordered stream of reload requests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::lifecycle::signals::SignalEvent;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    events: mpsc::Sender<SignalEvent>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher feeding reload requests into `events`.
    pub fn new(path: &Path, events: mpsc::Sender<SignalEvent>) -> Self {
        Self {
            path: path.to_path_buf(),
            events,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads should
    /// be delivered.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.events.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, requesting reload");
                        forward_reload(&tx);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn forward_reload(tx: &mpsc::Sender<SignalEvent>) {
    match tx.try_send(SignalEvent::Reload) {
        Ok(()) => {}
        // A reload is already pending; it will pick up this change too.
        Err(TrySendError::Full(_)) => {
            tracing::debug!("Signal channel full, coalescing config reload");
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Signal channel closed, dropping config reload");
        }
    }
}
