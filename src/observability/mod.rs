//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Lifecycle controller, server instances, handler:
//!     → logging.rs (tracing diagnostics, stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Request handler, dummy logger:
//!     → records.rs (JSON record stream, stdout)
//!
//! Consumers:
//!     → Log shipper (record stream)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments) and optional
//! - Records go through a sink trait so tests can capture them

pub mod logging;
pub mod metrics;
pub mod records;

pub use records::{MemorySink, Record, RecordSink, StdoutSink};
