//! The lifecycle controller.
//!
//! ```text
//! STARTING ──start──▶ RUNNING ──RELOAD──▶ RESTARTING ──stop, start──▶ RUNNING
//!                        │
//!                        └──TERMINATE──▶ STOPPING ──stop──▶ STOPPED ──▶ latch
//! ```
//!
//! Events are consumed one at a time in arrival order; a transition runs to
//! completion (including the bounded drain of the old instance) before the
//! next event is read.
//!
//! A restart stops the old instance before the new one binds. Both want the
//! same address, so there is a short window where nothing is listening.
//!
//! A failed start leaves the service unreachable in `RUNNING` until the next
//! reload. After `max_consecutive_bind_failures` failures in a row the
//! controller gives up and completes with [`Completion::Aborted`].

use tokio::sync::mpsc;

use crate::config::{ConfigSource, ServiceConfig};
use crate::lifecycle::instance::{ManagedServer, ServerLauncher, StopError};
use crate::lifecycle::shutdown::{Completion, CompletionLatch};
use crate::lifecycle::signals::SignalEvent;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Starting,
    Running,
    Restarting,
    Stopping,
    Stopped,
}

impl LifecycleState {
    fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Restarting => "restarting",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        }
    }
}

/// Owns the current server instance and drives it from signal events.
pub struct LifecycleController<L: ServerLauncher> {
    launcher: L,
    source: ConfigSource,
    config: ServiceConfig,
    events: mpsc::Receiver<SignalEvent>,
    state: LifecycleState,
    current: Option<L::Server>,
    bind_failures: u32,
}

impl<L: ServerLauncher> LifecycleController<L> {
    /// `config` is the configuration already loaded from `source`. Reloads
    /// re-read `source` when it points at a file.
    pub fn new(
        launcher: L,
        source: ConfigSource,
        config: ServiceConfig,
        events: mpsc::Receiver<SignalEvent>,
    ) -> Self {
        Self {
            launcher,
            source,
            config,
            events,
            state: LifecycleState::Starting,
            current: None,
            bind_failures: 0,
        }
    }

    /// Run until stopped, then fire `latch`.
    pub async fn run(mut self, latch: CompletionLatch) {
        tracing::info!(state = self.state.as_str(), "Lifecycle controller starting");
        self.start_instance().await;

        let completion = loop {
            if self.bind_budget_exhausted() {
                tracing::error!(
                    consecutive_failures = self.bind_failures,
                    "Giving up after repeated bind failures"
                );
                self.transition(LifecycleState::Stopping);
                break Completion::Aborted {
                    bind_failures: self.bind_failures,
                };
            }

            let event = match self.events.recv().await {
                Some(event) => event,
                None => {
                    tracing::warn!("Signal channel closed, treating as terminate");
                    SignalEvent::Terminate
                }
            };
            tracing::debug!(event = event.as_str(), "Signal event received");

            match event {
                SignalEvent::Reload => self.restart().await,
                SignalEvent::Terminate => break self.terminate().await,
            }
        };

        self.transition(LifecycleState::Stopped);
        latch.fire(completion);
    }

    async fn restart(&mut self) {
        tracing::info!("Restarting service");
        self.transition(LifecycleState::Restarting);
        // Non-fatal: the old instance is gone either way.
        let _ = self.stop_current().await;
        self.reload_config();
        self.start_instance().await;
    }

    async fn terminate(&mut self) -> Completion {
        tracing::info!("Shutting down service");
        self.transition(LifecycleState::Stopping);
        let clean = self.stop_current().await.is_ok();
        Completion::Terminated { clean }
    }

    async fn start_instance(&mut self) {
        match self.launcher.launch(&self.config).await {
            Ok(server) => {
                tracing::info!(
                    instance = %server.id(),
                    address = %server.local_addr(),
                    "Service reachable"
                );
                self.bind_failures = 0;
                self.current = Some(server);
            }
            Err(e) => {
                self.bind_failures += 1;
                metrics::record_bind_failure();
                tracing::error!(
                    error = %e,
                    bind_address = %self.config.server.bind_address,
                    consecutive_failures = self.bind_failures,
                    "Failed to start server instance, unreachable until next reload"
                );
            }
        }
        self.transition(LifecycleState::Running);
    }

    async fn stop_current(&mut self) -> Result<(), StopError> {
        let Some(mut server) = self.current.take() else {
            return Ok(());
        };

        let id = server.id();
        match server.stop(self.config.server.grace_period()).await {
            Ok(outcome) => {
                tracing::info!(instance = %id, outcome = ?outcome, "Server instance stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(instance = %id, error = %e, "Server instance did not stop cleanly");
                Err(e)
            }
        }
    }

    fn reload_config(&mut self) {
        if self.source.path().is_none() {
            return;
        }
        match self.source.load() {
            Ok(config) => {
                if config != self.config {
                    tracing::info!(
                        bind_address = %config.server.bind_address,
                        grace_period_ms = config.server.grace_period_ms,
                        "Configuration reloaded"
                    );
                }
                self.config = config;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }

    fn bind_budget_exhausted(&self) -> bool {
        let max = self.config.lifecycle.max_consecutive_bind_failures;
        max > 0 && self.bind_failures >= max
    }

    fn transition(&mut self, to: LifecycleState) {
        tracing::info!(from = self.state.as_str(), to = to.as_str(), "Lifecycle transition");
        metrics::record_transition(to.as_str());
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::instance::{InstanceId, StopOutcome};
    use crate::lifecycle::shutdown::completion_latch;
    use crate::net::ListenerError;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Start(InstanceId, String),
        Stop(InstanceId),
    }

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<Call>>>);

    impl Journal {
        fn push(&self, call: Call) {
            self.0.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeServer {
        id: InstanceId,
        journal: Journal,
        stopped: bool,
        fail_stop: bool,
    }

    impl ManagedServer for FakeServer {
        fn id(&self) -> InstanceId {
            self.id
        }

        fn local_addr(&self) -> SocketAddr {
            "127.0.0.1:8192".parse().unwrap()
        }

        async fn stop(&mut self, grace: Duration) -> Result<StopOutcome, StopError> {
            if self.stopped {
                return Ok(StopOutcome::AlreadyStopped);
            }
            self.stopped = true;
            self.journal.push(Call::Stop(self.id));
            if self.fail_stop {
                return Err(StopError::DeadlineExceeded { grace, abandoned: 1 });
            }
            Ok(StopOutcome::Drained)
        }
    }

    /// Launches fakes; `plan` decides per launch whether binding succeeds.
    #[derive(Default)]
    struct FakeLauncher {
        journal: Journal,
        plan: VecDeque<bool>,
        fail_stop: bool,
    }

    impl FakeLauncher {
        fn with_plan(plan: &[bool]) -> Self {
            Self {
                plan: plan.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl ServerLauncher for FakeLauncher {
        type Server = FakeServer;

        async fn launch(&mut self, config: &ServiceConfig) -> Result<FakeServer, ListenerError> {
            if !self.plan.pop_front().unwrap_or(true) {
                return Err(ListenerError::Bind {
                    address: "127.0.0.1:8192".parse().unwrap(),
                    source: std::io::ErrorKind::AddrInUse.into(),
                });
            }
            let id = InstanceId::next();
            self.journal
                .push(Call::Start(id, config.server.bind_address.clone()));
            Ok(FakeServer {
                id,
                journal: self.journal.clone(),
                stopped: false,
                fail_stop: self.fail_stop,
            })
        }
    }

    async fn drive(
        launcher: FakeLauncher,
        config: ServiceConfig,
        source: ConfigSource,
        events: &[SignalEvent],
    ) -> (Completion, Vec<Call>) {
        let journal = launcher.journal.clone();
        let (tx, rx) = mpsc::channel(64);
        for event in events {
            tx.send(*event).await.unwrap();
        }

        let controller = LifecycleController::new(launcher, source, config, rx);
        let (latch, waiter) = completion_latch();
        tokio::spawn(controller.run(latch));

        let completion = tokio::time::timeout(Duration::from_secs(5), waiter.wait())
            .await
            .expect("controller did not complete");
        drop(tx);
        (completion, journal.calls())
    }

    fn starts(calls: &[Call]) -> Vec<InstanceId> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Start(id, _) => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn terminate_stops_once() {
        let (completion, calls) = drive(
            FakeLauncher::default(),
            ServiceConfig::default(),
            ConfigSource::default(),
            &[SignalEvent::Terminate],
        )
        .await;

        assert_eq!(completion, Completion::Terminated { clean: true });
        let ids = starts(&calls);
        assert_eq!(ids.len(), 1);
        assert_eq!(calls[1], Call::Stop(ids[0]));
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn reload_stops_then_starts_a_new_instance() {
        let (completion, calls) = drive(
            FakeLauncher::default(),
            ServiceConfig::default(),
            ConfigSource::default(),
            &[SignalEvent::Reload, SignalEvent::Terminate],
        )
        .await;

        assert!(completion.is_clean());
        let ids = starts(&calls);
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(calls[1], Call::Stop(ids[0]));
        assert!(matches!(calls[2], Call::Start(id, _) if id == ids[1]));
        assert_eq!(calls[3], Call::Stop(ids[1]));
    }

    #[tokio::test]
    async fn events_are_handled_in_order() {
        let events = [
            SignalEvent::Reload,
            SignalEvent::Reload,
            SignalEvent::Reload,
            SignalEvent::Terminate,
            SignalEvent::Reload,
        ];
        let (completion, calls) = drive(
            FakeLauncher::default(),
            ServiceConfig::default(),
            ConfigSource::default(),
            &events,
        )
        .await;

        assert!(completion.is_clean());
        // start, then (stop, start) per reload, then the final stop; the
        // reload queued after terminate is never acted on.
        assert_eq!(calls.len(), 8);
        for pair in calls.chunks(2) {
            match pair {
                [Call::Start(started, _), Call::Stop(stopped)] => assert_eq!(started, stopped),
                other => panic!("unexpected sequence {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn closed_channel_terminates() {
        let launcher = FakeLauncher::default();
        let journal = launcher.journal.clone();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let (latch, waiter) = completion_latch();
        tokio::spawn(
            LifecycleController::new(launcher, ConfigSource::default(), ServiceConfig::default(), rx)
                .run(latch),
        );

        assert_eq!(waiter.wait().await, Completion::Terminated { clean: true });
        assert_eq!(journal.calls().len(), 2);
    }

    #[tokio::test]
    async fn bind_failure_is_not_fatal_when_unlimited() {
        let mut config = ServiceConfig::default();
        config.lifecycle.max_consecutive_bind_failures = 0;

        let (completion, calls) = drive(
            FakeLauncher::with_plan(&[true, false, false, false, true]),
            config,
            ConfigSource::default(),
            &[
                SignalEvent::Reload,
                SignalEvent::Reload,
                SignalEvent::Reload,
                SignalEvent::Reload,
                SignalEvent::Terminate,
            ],
        )
        .await;

        assert!(completion.is_clean());
        let ids = starts(&calls);
        assert_eq!(ids.len(), 2);
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::Stop(_))).count(),
            2
        );
    }

    #[tokio::test]
    async fn single_bind_failure_recovers_on_reload() {
        let (completion, calls) = drive(
            FakeLauncher::with_plan(&[false, true]),
            ServiceConfig::default(),
            ConfigSource::default(),
            &[SignalEvent::Reload, SignalEvent::Terminate],
        )
        .await;

        assert!(completion.is_clean());
        let ids = starts(&calls);
        assert_eq!(ids.len(), 1);
        assert_eq!(calls[1], Call::Stop(ids[0]));
    }

    #[tokio::test]
    async fn consecutive_bind_failures_abort() {
        let (completion, calls) = drive(
            FakeLauncher::with_plan(&[true, false, false]),
            ServiceConfig::default(),
            ConfigSource::default(),
            &[SignalEvent::Reload, SignalEvent::Reload, SignalEvent::Terminate],
        )
        .await;

        assert_eq!(completion, Completion::Aborted { bind_failures: 2 });
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn failed_final_stop_is_unclean() {
        let launcher = FakeLauncher {
            fail_stop: true,
            ..FakeLauncher::default()
        };
        let (completion, calls) = drive(
            launcher,
            ServiceConfig::default(),
            ConfigSource::default(),
            &[SignalEvent::Reload, SignalEvent::Terminate],
        )
        .await;

        // The failed stop during reload does not block the restart.
        assert_eq!(starts(&calls).len(), 2);
        assert_eq!(completion, Completion::Terminated { clean: false });
    }

    #[tokio::test]
    async fn reload_rereads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_address = \"127.0.0.1:7001\"").unwrap();
        let source = ConfigSource::new(Some(file.path().to_path_buf()));
        let config = source.load().unwrap();

        let launcher = FakeLauncher::default();
        let journal = launcher.journal.clone();
        let (tx, rx) = mpsc::channel(4);
        let (latch, waiter) = completion_latch();
        tokio::spawn(LifecycleController::new(launcher, source, config, rx).run(latch));

        // Rewrite the file only after the first instance is up.
        while journal.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        std::fs::write(file.path(), "[server]\nbind_address = \"127.0.0.1:7002\"\n").unwrap();

        tx.send(SignalEvent::Reload).await.unwrap();
        tx.send(SignalEvent::Terminate).await.unwrap();
        assert!(waiter.wait().await.is_clean());

        let addresses: Vec<String> = journal
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Start(_, addr) => Some(addr),
                _ => None,
            })
            .collect();
        assert_eq!(addresses, vec!["127.0.0.1:7001", "127.0.0.1:7002"]);
    }

    #[tokio::test]
    async fn broken_config_on_reload_keeps_previous() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_address = \"127.0.0.1:7003\"").unwrap();
        let source = ConfigSource::new(Some(file.path().to_path_buf()));
        let config = source.load().unwrap();

        let launcher = FakeLauncher::default();
        let journal = launcher.journal.clone();
        let (tx, rx) = mpsc::channel(4);
        let (latch, waiter) = completion_latch();
        tokio::spawn(LifecycleController::new(launcher, source, config, rx).run(latch));

        while journal.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        std::fs::write(file.path(), "[server\n").unwrap();

        tx.send(SignalEvent::Reload).await.unwrap();
        tx.send(SignalEvent::Terminate).await.unwrap();
        assert!(waiter.wait().await.is_clean());

        let calls = journal.calls();
        assert_eq!(starts(&calls).len(), 2);
        assert!(matches!(&calls[2], Call::Start(_, addr) if addr == "127.0.0.1:7003"));
    }
}
