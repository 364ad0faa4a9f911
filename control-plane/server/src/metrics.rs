//! Installs the global OpenTelemetry meter provider on top of a Prometheus
//! exporter, so [`pipeline::metrics::PipelineMetrics`] records against a
//! registry this process can serve at `/metrics` (SPEC_FULL §3: "health and
//! metrics as distinct listeners").

use opentelemetry_prometheus::PrometheusExporter;

/// Registers the global meter provider and returns the exporter the metrics
/// listener scrapes from.
pub fn init() -> PrometheusExporter {
    opentelemetry_prometheus::exporter().init()
}
