//! Emits dummy log records, once or on a timer, for exercising log pipelines.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use rand::Rng;
use tokio::sync::mpsc;

use response_time_api::lifecycle::signals::{forward_os_signals, SignalEvent};
use response_time_api::observability::records::{Record, LEVEL_ERROR, LEVEL_INFO};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Log4j,
}

#[derive(Parser, Debug)]
#[command(name = "dummy-logger")]
#[command(about = "Print dummy log records in the service's record format", long_about = None)]
struct Cli {
    /// The log message to send
    #[arg(long, default_value = "Hello world!")]
    message: String,

    /// The levelname to use; debug, info, warn, error, etc.
    #[arg(long, default_value = "info")]
    level: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Keep emitting every N milliseconds until interrupted
    #[arg(long)]
    interval: Option<u64>,

    /// Probability of an error record per tick, between 0 and 1.0
    #[arg(long, default_value_t = 0.1)]
    error_rate: f64,

    /// Program tag attached to timed records
    #[arg(long, default_value = "dummy-logger")]
    tag: String,
}

fn render(record: &Record, format: Format) -> Result<String, serde_json::Error> {
    match format {
        Format::Json => record.to_line(),
        Format::Log4j => Ok(format!("[{}]: {}", record.fields.levelname, record.message)),
    }
}

fn tick_record(roll: f64, error_rate: f64, tag: &str) -> Record {
    if roll <= error_rate {
        Record::new(LEVEL_ERROR, "Oh noes!").with_tag(tag)
    } else {
        Record::new(LEVEL_INFO, "Everything is fine!").with_tag(tag)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(interval_ms) = cli.interval else {
        let record = Record::new(cli.level.as_str(), cli.message.as_str());
        println!("{}", render(&record, cli.format)?);
        return Ok(());
    };

    let (tx, mut events) = mpsc::channel(4);
    let _forwarder = forward_os_signals(tx)?;
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

    eprintln!("Sending log lines every {}ms, hit ctrl-c to stop", interval_ms);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SignalEvent::Reload) => continue,
                Some(SignalEvent::Terminate) | None => break,
            },
            _ = ticker.tick() => {
                let roll = rand::thread_rng().gen::<f64>();
                let record = tick_record(roll, cli.error_rate, &cli.tag);
                println!("{}", render(&record, cli.format)?);
            }
        }
    }

    eprintln!("Done!");
    Ok(())
}
