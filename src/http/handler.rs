//! Synthetic response-time endpoint.
//!
//! `GET /{status}?time=<ms>` answers nothing interesting over HTTP. Its
//! product is the record stream: one metric record per request, preceded by
//! an error record when `status` is not an integer.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::config::EndpointConfig;
use crate::observability::metrics;
use crate::observability::records::{
    Metric, MetricAttributes, Record, RecordSink, LEVEL_ERROR, LEVEL_INFO,
};

/// State shared by every request of one server instance.
#[derive(Clone)]
pub struct EndpointState {
    pub sink: Arc<dyn RecordSink>,
    pub config: Arc<EndpointConfig>,
}

/// Build the records for one request.
///
/// An unparsable `status` is reported and then treated as `0`; an absent or
/// unparsable `time` falls back to the configured default.
pub fn endpoint_records(raw_status: &str, raw_time: Option<&str>, config: &EndpointConfig) -> Vec<Record> {
    let mut records = Vec::with_capacity(2);

    let time_ms = raw_time
        .and_then(|t| t.parse::<i64>().ok())
        .unwrap_or(config.default_time_ms);

    let status = match raw_status.parse::<i64>() {
        Ok(status) => status,
        Err(_) => {
            records.push(Record::new(
                LEVEL_ERROR,
                // Log shippers match on this exact text, double space included.
                format!("Failed to parse status '{}' as  http status code", raw_status),
            ));
            0
        }
    };

    records.push(
        Record::new(LEVEL_INFO, format!("Responded with {} in {}ms", status, time_ms)).with_metric(
            Metric {
                service: config.service.clone(),
                metric: time_ms,
                attributes: MetricAttributes {
                    status_code: status.to_string(),
                },
            },
        ),
    );

    records
}

pub async fn endpoint_handler(
    State(state): State<EndpointState>,
    Path(status): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    let records = endpoint_records(&status, query.get("time").map(String::as_str), &state.config);

    for record in &records {
        state.sink.emit(record);
    }

    if let Some(metric) = records.last().and_then(|r| r.fields.metric.as_ref()) {
        metrics::record_endpoint_hit(&metric.attributes.status_code, metric.metric);
    }

    StatusCode::OK
}
