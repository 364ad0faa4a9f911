//! Ambient stack shared by every binary in the workspace: version-info
//! macros and tracing/telemetry initialization. Carried over from the
//! teacher regardless of the spec's non-goals (logging/metrics are ambient
//! concerns, not scoped-out features).

pub mod tracing_telemetry;

/// Default bind address for the gRPC frontend.
pub const DEFAULT_GRPC_BIND_ADDR: &str = "0.0.0.0:50051";
/// Default bind address for the REST frontend.
pub const DEFAULT_REST_BIND_ADDR: &str = "0.0.0.0:8080";
/// Default bind address for the plaintext REST health endpoint.
pub const DEFAULT_HEALTH_BIND_ADDR: &str = "0.0.0.0:8081";
/// Grace period given to in-flight requests/streams on shutdown (spec §5).
pub const DEFAULT_SHUTDOWN_GRACE: &str = "30s";
/// Interval between Controller Manager scans (spec §4.8).
pub const DEFAULT_SCAN_INTERVAL: &str = "2s";
/// Minimum wait between JWK reload attempts (spec §4.11).
pub const DEFAULT_JWK_RELOAD_MIN_WAIT: &str = "60s";

/// Expands to a `"<name> v<version>"` string built from the invoking
/// crate's own `Cargo.toml` metadata.
#[macro_export]
macro_rules! version_info_str {
    () => {
        concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"))
    };
}

/// Expands to the invoking crate's `Cargo.toml` `description` field, used as
/// the top-level `structopt` help string.
#[macro_export]
macro_rules! package_description {
    () => {
        env!("CARGO_PKG_DESCRIPTION")
    };
}

/// Logs name/version/description once at process start, before any flags
/// are parsed.
#[macro_export]
macro_rules! print_package_info {
    () => {
        tracing::info!(
            version = $crate::version_info_str!(),
            "{}",
            $crate::package_description!()
        );
    };
}
