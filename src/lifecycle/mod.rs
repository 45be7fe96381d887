//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! SIGHUP / config change ─┐
//! SIGINT / SIGTERM ───────┴→ signals.rs (SignalEvent channel)
//!     → controller.rs (one event at a time)
//!         → instance.rs (start / stop server instances)
//!     → shutdown.rs (completion latch)
//!     → startup.rs returns, process exits
//! ```
//!
//! # Design Decisions
//! - The signal channel is injected into the controller, not global
//! - Only the controller touches the current server instance
//! - Restart is stop-then-start: a brief gap, never two listeners on one address
//! - Stop has a grace period: forced close after the deadline

pub mod controller;
pub mod instance;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use controller::LifecycleController;
pub use instance::{HttpLauncher, InstanceId, ManagedServer, ServerInstance, ServerLauncher};
pub use shutdown::{completion_latch, Completion, CompletionLatch, CompletionWaiter};
pub use signals::SignalEvent;
pub use startup::{run_service, StartupError};
