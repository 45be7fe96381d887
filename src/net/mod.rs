//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! bind address (config)
//!     → listener.rs (parse, bind, typed errors)
//!     → TcpListener handed to a server instance
//!     → accept loop owns it until the instance stops
//!     → connection.rs (one guard per open connection)
//! ```
//!
//! # Design Decisions
//! - Binding happens in the caller's task so failures are returned, not logged away
//! - A stopped instance drops its listener, releasing the port before a restart binds

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{bind, ListenerError};
