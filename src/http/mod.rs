//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (listener owned by a server instance)
//!     → server.rs (accept loop, hyper connection task, Axum middleware)
//!     → handler.rs (GET /{status}?time=, emit records)
//!     → 200 OK, empty body
//! ```

pub mod handler;
pub mod server;

pub use handler::endpoint_records;
pub use server::{HttpServer, ServePhase};
