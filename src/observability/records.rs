//! Structured record stream.
//!
//! Records are newline-delimited JSON objects in the shape the downstream
//! log shipper expects:
//!
//! ```text
//! { "@message": "...", "@fields": { "levelname": "INFO",
//!   "_riemann_metric": { "service": "...", "metric": 50,
//!                        "attributes": { "status_code": "404" } } } }
//! ```
//!
//! This stream is distinct from the tracing diagnostics: it is the product
//! of the service, written to stdout, while diagnostics go to stderr.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

pub const LEVEL_INFO: &str = "INFO";
pub const LEVEL_ERROR: &str = "ERROR";

/// One structured record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(rename = "@message")]
    pub message: String,

    #[serde(rename = "@fields")]
    pub fields: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fields {
    pub levelname: String,

    #[serde(rename = "_riemann_metric", default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,

    /// Program tag, set by the dummy generators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Fixed-schema metric payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub service: String,
    pub metric: i64,
    pub attributes: MetricAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricAttributes {
    pub status_code: String,
}

impl Record {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Fields {
                levelname: level.into(),
                metric: None,
                tag: None,
            },
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.fields.metric = Some(metric);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.fields.tag = Some(tag.into());
        self
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Destination for records.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &Record);
}

/// Writes each record as one line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl RecordSink for StdoutSink {
    fn emit(&self, record: &Record) {
        let line = match record.to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize record");
                return;
            }
        };

        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "Failed to write record to stdout");
        }
    }
}

/// Keeps records in memory. Used by tests and embedders.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, in order.
    pub fn records(&self) -> Vec<Record> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: &Record) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_record_shape() {
        let record = Record::new(LEVEL_ERROR, "boom");
        let value: serde_json::Value = serde_json::from_str(&record.to_line().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "@message": "boom", "@fields": { "levelname": "ERROR" } })
        );
    }

    #[test]
    fn metric_record_shape() {
        let record = Record::new(LEVEL_INFO, "Responded with 404 in 50ms").with_metric(Metric {
            service: "my-app/response-time".into(),
            metric: 50,
            attributes: MetricAttributes {
                status_code: "404".into(),
            },
        });
        let value: serde_json::Value = serde_json::from_str(&record.to_line().unwrap()).unwrap();
        assert_eq!(
            value["@fields"]["_riemann_metric"],
            json!({
                "service": "my-app/response-time",
                "metric": 50,
                "attributes": { "status_code": "404" }
            })
        );
        assert!(!record.to_line().unwrap().contains('\n'));
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(&Record::new(LEVEL_INFO, "one"));
        sink.emit(&Record::new(LEVEL_INFO, "two").with_tag("t"));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "one");
        assert_eq!(records[1].fields.tag.as_deref(), Some("t"));
    }
}
