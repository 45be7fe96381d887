//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener settings (bind address, grace period).
    pub server: ServerConfig,

    /// Synthetic endpoint settings.
    pub endpoint: EndpointConfig,

    /// Lifecycle controller settings.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8192").
    pub bind_address: String,

    /// How long a stopping instance may drain in-flight requests, in milliseconds.
    /// Zero closes immediately.
    pub grace_period_ms: u64,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8192".to_string(),
            grace_period_ms: 5000,
            request_timeout_secs: 30,
        }
    }
}

/// Synthetic endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    /// Value of the `service` key in emitted metric records.
    pub service: String,

    /// Latency reported when `?time` is absent or unparsable.
    pub default_time_ms: i64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            service: "my-app/response-time".to_string(),
            default_time_ms: 20,
        }
    }
}

/// Lifecycle controller configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Consecutive bind failures after which the controller gives up.
    /// Zero means never give up.
    pub max_consecutive_bind_failures: u32,

    /// Buffer size of the signal channel.
    pub channel_capacity: usize,

    /// Treat changes to the config file as a reload request.
    pub watch_config: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_consecutive_bind_failures: 2,
            channel_capacity: 16,
            watch_config: false,
        }
    }
}

/// Diagnostic output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Diagnostic line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ServerConfig {
    /// Grace period as a duration.
    pub fn grace_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.grace_period_ms)
    }
}
