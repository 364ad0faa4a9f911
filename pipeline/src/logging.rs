//! Correlation-id generation and start/end request logging (spec §4.10 step 2).

use std::time::Instant;

use ulid::Ulid;

pub fn new_op_id() -> String {
    Ulid::new().to_string()
}

/// Emitted at the start of a request; `finish` logs the matching end line
/// with status and duration once the handler returns.
pub struct RequestLog {
    op_id: String,
    method: String,
    start: Instant,
}

impl RequestLog {
    pub fn start(op_id: impl Into<String>, method: impl Into<String>) -> Self {
        let op_id = op_id.into();
        let method = method.into();
        tracing::info!(op_id = %op_id, method = %method, "request started");
        Self {
            op_id,
            method,
            start: Instant::now(),
        }
    }

    pub fn finish(self, status_code: u16) {
        tracing::info!(
            op_id = %self.op_id,
            method = %self.method,
            status = status_code,
            duration_ms = self.start.elapsed().as_millis() as u64,
            "request finished"
        );
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
