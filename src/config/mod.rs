//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply CLI overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed to each new server instance
//!
//! On reload signal:
//!     SIGHUP, or watcher.rs detects a file change
//!     → lifecycle controller re-reads through ConfigSource
//!     → invalid config: keep previous one, restart anyway
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError, ConfigSource};
pub use schema::{
    EndpointConfig, LifecycleConfig, LogFormat, ObservabilityConfig, ServerConfig, ServiceConfig,
};
pub use validation::ValidationError;
