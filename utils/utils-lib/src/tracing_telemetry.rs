//! Structured logging and optional Jaeger trace export, shared by every
//! binary (`rest`, `grpc`, the `server` composition root). Initializes the
//! global `tracing` subscriber exactly once per process.

use opentelemetry::sdk::trace::Tracer;
use opentelemetry::KeyValue;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Parses a `key=value` pair from a `--tracing-tags` CLI flag into an
/// OpenTelemetry `KeyValue`.
pub fn parse_key_value(src: &str) -> Result<KeyValue, String> {
    let mut parts = src.splitn(2, '=');
    let key = parts.next().ok_or_else(|| format!("missing key in '{}'", src))?;
    let value = parts
        .next()
        .ok_or_else(|| format!("expected 'key=value', got '{}'", src))?;
    Ok(KeyValue::new(key.to_string(), value.to_string()))
}

/// Installs the global `tracing` subscriber: an `EnvFilter` driven by
/// `RUST_LOG` (falling back to `info`), and, when `jaeger_endpoint` is set,
/// a Jaeger exporter layer tagged with `service_name` and `tags`.
pub fn init_tracing(service_name: &str, tags: Vec<KeyValue>, jaeger_endpoint: Option<String>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    match jaeger_endpoint {
        Some(endpoint) => {
            let tracer = build_jaeger_tracer(service_name, tags, &endpoint);
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            let _ = tracing::subscriber::set_global_default(subscriber.with(otel_layer));
        }
        None => {
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}

fn build_jaeger_tracer(service_name: &str, tags: Vec<KeyValue>, endpoint: &str) -> Tracer {
    opentelemetry_jaeger::new_pipeline()
        .with_agent_endpoint(endpoint)
        .with_service_name(service_name.to_string())
        .with_tags(tags)
        .install_simple()
        .unwrap_or_else(|e| panic!("failed to install Jaeger pipeline: {}", e))
}

/// Flushes any pending spans. Call once, at the very end of `main`.
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
