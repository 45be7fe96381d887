//! Response-time API with signal-driven lifecycle management.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{run_service, Completion, LifecycleController, SignalEvent};
