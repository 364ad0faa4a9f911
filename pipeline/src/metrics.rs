//! Per-method request metrics (spec §4.10 step 3): a request counter
//! labelled by method and status code, and a duration histogram.

use std::time::Duration;

use opentelemetry::metrics::{BoundCounter, Counter, Meter, ValueRecorder};
use opentelemetry::KeyValue;

pub struct PipelineMetrics {
    requests_total: Counter<u64>,
    request_duration: ValueRecorder<f64>,
}

impl PipelineMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests_total: meter.u64_counter("requests_total").init(),
            request_duration: meter.f64_value_recorder("request_duration_seconds").init(),
        }
    }

    pub fn observe(&self, method: &str, status_code: u16, duration: Duration) {
        let labels = [
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status_code.to_string()),
        ];
        self.requests_total.add(1, &labels);
        self.request_duration.record(duration.as_secs_f64(), &labels);
    }

    /// Pre-binds the counter to a method/status pair for hot paths that
    /// observe the same label set repeatedly (e.g. a health-check poller).
    pub fn bind(&self, method: &str, status_code: u16) -> BoundCounter<u64> {
        let labels = [
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status_code.to_string()),
        ];
        self.requests_total.bind(&labels)
    }
}
