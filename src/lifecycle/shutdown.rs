//! Shutdown completion signalling.
//!
//! The lifecycle controller owns a [`CompletionLatch`] and fires it once the
//! last server instance has stopped. The process entry point holds the
//! matching [`CompletionWaiter`] and exits when it resolves. Firing consumes
//! the latch, so it cannot happen twice.

use std::process::ExitCode;

use tokio::sync::oneshot;

/// How the controller finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Stopped after a terminate request. `clean` is false when the final
    /// stop reported an error.
    Terminated { clean: bool },
    /// Gave up after too many consecutive bind failures.
    Aborted { bind_failures: u32 },
    /// The controller went away without firing the latch.
    Abandoned,
}

impl Completion {
    pub fn is_clean(&self) -> bool {
        matches!(self, Completion::Terminated { clean: true })
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_clean() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Write side of the one-shot completion signal.
#[derive(Debug)]
pub struct CompletionLatch {
    tx: oneshot::Sender<Completion>,
}

/// Read side of the one-shot completion signal.
#[derive(Debug)]
pub struct CompletionWaiter {
    rx: oneshot::Receiver<Completion>,
}

/// Create a connected latch and waiter.
pub fn completion_latch() -> (CompletionLatch, CompletionWaiter) {
    let (tx, rx) = oneshot::channel();
    (CompletionLatch { tx }, CompletionWaiter { rx })
}

impl CompletionLatch {
    /// Signal completion.
    pub fn fire(self, completion: Completion) {
        if self.tx.send(completion).is_err() {
            tracing::debug!("Completion waiter already gone");
        }
    }
}

impl CompletionWaiter {
    /// Wait for the latch to fire.
    ///
    /// Resolves to [`Completion::Abandoned`] if the latch is dropped unfired.
    pub async fn wait(self) -> Completion {
        self.rx.await.unwrap_or(Completion::Abandoned)
    }
}
