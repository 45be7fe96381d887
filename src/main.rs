//! Response-time API
//!
//! A synthetic endpoint that echoes a status code and a latency value into a
//! structured record stream, wrapped in a signal-driven lifecycle.
//!
//! # Architecture Overview
//!
//! ```text
//!   SIGHUP ──────┐                          ┌──────────────────────────┐
//!   SIGINT ──────┼──▶ signal channel ──────▶│   lifecycle controller   │
//!   SIGTERM ─────┤                          │ start / restart / stop   │
//!   config edit ─┘                          └───────────┬──────────────┘
//!                                                       │ owns
//!                                                       ▼
//!   GET /{status}?time=ms ────────────────▶ ┌──────────────────────────┐
//!                                           │     server instance      │──▶ records (stdout)
//!                                           │ listener + axum router   │
//!                                           └──────────────────────────┘
//!                                                       │ stopped
//!                                                       ▼
//!                                             completion latch ──▶ exit
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use response_time_api::config::{ConfigSource, LogFormat};
use response_time_api::observability::{logging, StdoutSink};
use response_time_api::run_service;

#[derive(Parser, Debug)]
#[command(name = "response-time-api", version, about = "Synthetic response-time endpoint with graceful restarts")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address (e.g. 0.0.0.0:8192).
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the diagnostic log format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let source = ConfigSource::new(args.config).with_bind_override(args.bind);
    let mut config = source.load()?;

    if let Some(level) = args.log_level {
        config.observability.log_level = level;
    }
    if let Some(format) = args.log_format {
        config.observability.log_format = format;
    }
    logging::init_logging(&config.observability);

    tracing::info!("response-time-api v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        grace_period_ms = config.server.grace_period_ms,
        max_consecutive_bind_failures = config.lifecycle.max_consecutive_bind_failures,
        watch_config = config.lifecycle.watch_config,
        "Configuration loaded"
    );

    let completion = run_service(source, config, Arc::new(StdoutSink)).await?;

    tracing::info!(outcome = ?completion, "Exiting");
    Ok(completion.exit_code())
}
