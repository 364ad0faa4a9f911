//! The Prometheus scrape endpoint, served on its own listener, separate
//! from both the REST API and the plaintext health endpoint (SPEC_FULL §3).

use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer};
use opentelemetry_prometheus::PrometheusExporter;
use prometheus::{Encoder, TextEncoder};
use snafu::ResultExt;

use crate::error::{self, ServerError};

async fn scrape(exporter: web::Data<PrometheusExporter>) -> HttpResponse {
    let metric_families = exporter.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(%error, "metrics: failed to encode Prometheus text exposition");
    }
    HttpResponse::Ok().content_type(encoder.format_type()).body(buffer)
}

pub fn build(addr: &str, exporter: PrometheusExporter, shutdown_grace: Duration) -> Result<actix_web::dev::Server, ServerError> {
    let exporter = web::Data::new(exporter);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(exporter.clone())
            .route("/metrics", web::get().to(scrape))
    })
    .shutdown_timeout(shutdown_grace.as_secs())
    .bind(addr)
    .context(error::MetricsBind { addr: addr.to_string() })?
    .run();
    Ok(server)
}
