//! Init-time failures (spec §6: "nonzero on init failure"). Distinct from
//! [`common_lib::SvcError`], which classifies failures that happen once the
//! server is already serving requests.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServerError {
    #[snafu(display("failed to connect to the store: {}", source))]
    StoreConnect { source: store::StoreError },

    #[snafu(display("failed to run store migrations: {}", source))]
    StoreMigrate { source: store::StoreError },

    #[snafu(display("registry registration failed: {}", source))]
    Registry { source: common_lib::SvcError },

    #[snafu(display("failed to read TLS material '{}': {}", path, source))]
    ReadTls { path: String, source: std::io::Error },

    #[snafu(display("invalid TLS material '{}': {}", path, reason))]
    InvalidTls { path: String, reason: String },

    #[snafu(display("failed to bind REST listener on {}: {}", addr, source))]
    RestBind { addr: String, source: std::io::Error },

    #[snafu(display("failed to bind health listener on {}: {}", addr, source))]
    HealthBind { addr: String, source: std::io::Error },

    #[snafu(display("failed to bind metrics listener on {}: {}", addr, source))]
    MetricsBind { addr: String, source: std::io::Error },

    #[snafu(display("gRPC transport error: {}", source))]
    GrpcTls { source: tonic::transport::Error },
}
