//! `serve` command-line surface (spec §6). Not exhaustive in the spec's own
//! words; this is the flag set needed to stand every collaborator up.

use std::path::PathBuf;

use opentelemetry::KeyValue;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = utils::package_description!(), version = utils::version_info_str!())]
pub struct CliArgs {
    /// Postgres connection string for the resource store.
    #[structopt(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum size of the store's connection pool.
    #[structopt(long, default_value = "10")]
    pub database_max_connections: u32,

    /// Expose the gRPC frontend in addition to REST.
    #[structopt(long)]
    pub enable_grpc: bool,

    /// Bind address for the gRPC frontend.
    #[structopt(long, default_value = utils::DEFAULT_GRPC_BIND_ADDR)]
    pub grpc_server_bindaddress: String,

    /// Terminate gRPC connections with TLS.
    #[structopt(long)]
    pub grpc_enable_tls: bool,

    /// PEM certificate chain for the gRPC TLS listener.
    #[structopt(long, parse(from_os_str))]
    pub grpc_tls_cert_file: Option<PathBuf>,

    /// PEM private key for the gRPC TLS listener.
    #[structopt(long, parse(from_os_str))]
    pub grpc_tls_key_file: Option<PathBuf>,

    /// Bind address for the REST frontend.
    #[structopt(long, default_value = utils::DEFAULT_REST_BIND_ADDR)]
    pub api_server_bindaddress: String,

    /// Terminate REST connections with TLS.
    #[structopt(long)]
    pub enable_https: bool,

    /// PEM certificate chain for the REST TLS listener.
    #[structopt(long, parse(from_os_str))]
    pub tls_cert_file: Option<PathBuf>,

    /// PEM private key for the REST TLS listener.
    #[structopt(long, parse(from_os_str))]
    pub tls_key_file: Option<PathBuf>,

    /// Require a valid JWT bearer token on every non-exempt request.
    #[structopt(long)]
    pub enable_jwt: bool,

    /// JWK set URL the JWK provider reloads keys from.
    #[structopt(long)]
    pub jwks_url: Option<String>,

    /// JWK set file the JWK provider reloads keys from.
    #[structopt(long, parse(from_os_str))]
    pub jwks_file: Option<PathBuf>,

    /// Enforce authorization policy. Not implemented: authorization policy
    /// is an external collaborator (spec §1, §3 Non-goals); the flag is
    /// accepted and logged, not acted on.
    #[structopt(long)]
    pub enable_authz: bool,

    /// Run with authentication bypassed, for local development. Overrides
    /// `--enable-jwt`.
    #[structopt(long)]
    pub enable_mock: bool,

    /// Lower the log level to debug.
    #[structopt(long)]
    pub debug: bool,

    /// Log verbosity, repeatable (-v, -vv, -vvv).
    #[structopt(short, long, parse(from_occurrences))]
    pub v: u8,

    /// Grace period given to in-flight requests/streams on shutdown.
    #[structopt(long, default_value = utils::DEFAULT_SHUTDOWN_GRACE)]
    pub shutdown_grace_period: humantime::Duration,

    /// Interval between Controller Manager scans.
    #[structopt(long, default_value = utils::DEFAULT_SCAN_INTERVAL)]
    pub controller_scan_interval: humantime::Duration,

    /// Minimum wait between JWK reload attempts triggered by a cache miss.
    #[structopt(long, default_value = utils::DEFAULT_JWK_RELOAD_MIN_WAIT)]
    pub jwk_reload_min_wait: humantime::Duration,

    /// Bind address for the plaintext REST health endpoint.
    #[structopt(long, default_value = utils::DEFAULT_HEALTH_BIND_ADDR)]
    pub health_bindaddress: String,

    /// Bind address for the Prometheus metrics endpoint.
    #[structopt(long, default_value = "0.0.0.0:9090")]
    pub metrics_bindaddress: String,

    /// Per-subscriber channel capacity for the event broker.
    #[structopt(long, default_value = "64")]
    pub broker_buffer_size: usize,

    /// Add process service tags to the traces.
    #[structopt(short, long, env = "TRACING_TAGS", value_delimiter = ",", parse(try_from_str = utils::tracing_telemetry::parse_key_value))]
    pub tracing_tags: Vec<KeyValue>,

    /// Trace requests to the Jaeger endpoint agent.
    #[structopt(short, long)]
    pub jaeger: Option<String>,
}

impl CliArgs {
    pub fn args() -> Self {
        CliArgs::from_args()
    }
}
