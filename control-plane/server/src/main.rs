//! Composition root for the `serve` binary (spec §5, §6): parses flags,
//! stands up the store, broker, Controller Manager, and Registry, wires the
//! REST and gRPC frontends behind the shared pipeline, and drives graceful
//! shutdown on `SIGTERM`/`SIGINT`.

mod cli;
mod collaborator;
mod env;
mod error;
mod grpc_server;
mod health_server;
mod metrics;
mod metrics_server;
mod rest_server;
mod shutdown;
mod tls;

use std::sync::Arc;
use std::time::Duration;

use broker::EventBroker;
use controller::ControllerManager;
use pipeline::auth::AuthConfig;
use pipeline::grpc::GrpcPipelineState;
use pipeline::metrics::PipelineMetrics;
use pipeline::rest::PipelineState;
use rest::RestConfig;
use snafu::ResultExt;
use store::{AdvisoryLockService, EventStore, PgAdvisoryLockService, PgEventStore, Store};

use crate::cli::CliArgs;
use crate::collaborator::{HttpCollaborator, ManagedServer, TaskCollaborator};
use crate::error::{self, ServerError};

/// Versioned base path this process mounts its REST API under. Not a CLI
/// flag: both kinds share one deployment's routing surface, so it is fixed
/// rather than per-kind (spec §6: `/api/<service>/v1`).
const REST_BASE_PATH: &str = "/api/v1";

#[actix_web::main]
async fn main() -> Result<(), ServerError> {
    let args = CliArgs::args();

    if (args.debug || args.v > 0) && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", if args.debug { "debug" } else { "info" });
    }
    utils::tracing_telemetry::init_tracing("server", args.tracing_tags.clone(), args.jaeger.clone());
    utils::print_package_info!();

    let store = Store::connect(&args.database_url, args.database_max_connections)
        .await
        .context(error::StoreConnect)?;
    store.migrate().await.context(error::StoreMigrate)?;

    let events: Arc<dyn EventStore> = Arc::new(PgEventStore::new());
    let locks: Arc<dyn AdvisoryLockService> = Arc::new(PgAdvisoryLockService::new());

    let broker = Arc::new(EventBroker::new(args.broker_buffer_size, store.clone(), events.clone()));
    let controller_manager = Arc::new(
        ControllerManager::new(store.clone(), events.clone()).with_scan_interval(args.controller_scan_interval.into()),
    );

    let mut registry = env::ServerRegistry::new();
    env::register_kinds(&mut registry).context(error::Registry)?;

    let server_env = env::ServerEnv {
        events: events.clone(),
        locks: locks.clone(),
    };
    let dinosaur_service = registry
        .build_service("dinosaurs", &server_env)
        .and_then(env::ResourceServiceHandle::into_dinosaurs)
        .expect("dinosaurs service factory registered in register_kinds");
    let fossil_service = registry
        .build_service("fossils", &server_env)
        .and_then(env::ResourceServiceHandle::into_fossils)
        .expect("fossils service factory registered in register_kinds");

    env::register_controllers(&mut registry, dinosaur_service.clone(), fossil_service.clone()).context(error::Registry)?;
    registry.freeze();

    for step in registry.migrations() {
        tracing::debug!(name = %step.name, "schema migration step registered");
    }

    let ctrl_ctx = env::CtrlCtx {
        manager: controller_manager.clone(),
    };
    registry.wire_controllers(&ctrl_ctx);

    let rest_routes = env::RestRouteCtx::default();
    registry.wire_rest_routes(&rest_routes);

    let auth = build_auth_config(&args);

    let exporter = metrics::init();
    let meter = opentelemetry::global::meter("server");
    let pipeline_metrics = Arc::new(PipelineMetrics::new(&meter));

    let pipeline_state = Arc::new(PipelineState {
        store: store.clone(),
        metrics: pipeline_metrics.clone(),
        auth: auth.clone(),
        broker: broker.clone(),
        exempt_prefixes: vec![rest::HEALTH_PATH_PREFIX.to_string()],
    });
    let grpc_pipeline_state = Arc::new(GrpcPipelineState {
        store: store.clone(),
        metrics: pipeline_metrics,
        auth,
        broker: broker.clone(),
    });

    let (controller_join, controller_shutdown) = controller_manager.spawn();
    let grace_period: Duration = args.shutdown_grace_period.into();

    let rest_tls = if args.enable_https {
        let cert = args.tls_cert_file.as_deref().expect("--tls-cert-file required with --enable-https");
        let key = args.tls_key_file.as_deref().expect("--tls-key-file required with --enable-https");
        Some(tls::load_rustls_config(cert, key)?)
    } else {
        None
    };

    let rest_server = rest_server::build(
        &args.api_server_bindaddress,
        rest_tls,
        pipeline_state,
        dinosaur_service.clone(),
        fossil_service.clone(),
        RestConfig::new(REST_BASE_PATH),
        rest_routes,
        grace_period,
    )?;
    let rest_task = tokio::spawn(rest_server);

    let health_server = health_server::build(&args.health_bindaddress, grace_period)?;
    let health_task = tokio::spawn(health_server);

    let metrics_server = metrics_server::build(&args.metrics_bindaddress, exporter, grace_period)?;
    let metrics_task = tokio::spawn(metrics_server);

    let grpc_shutdown = if args.enable_grpc {
        let grpc_addr = args
            .grpc_server_bindaddress
            .parse()
            .expect("--grpc-server-bindaddress must be a valid socket address");
        let identity = if args.grpc_enable_tls {
            let cert = args.grpc_tls_cert_file.as_deref().expect("--grpc-tls-cert-file required with --grpc-enable-tls");
            let key = args.grpc_tls_key_file.as_deref().expect("--grpc-tls-key-file required with --grpc-enable-tls");
            Some(tls::load_tonic_identity(cert, key).await?)
        } else {
            None
        };
        let (tx, rx) = tokio::sync::oneshot::channel();
        let join = tokio::spawn(grpc_server::run(
            grpc_addr,
            grpc_pipeline_state,
            dinosaur_service,
            fossil_service,
            identity,
            rx,
        ));
        Some((tx, join))
    } else {
        None
    };

    shutdown::wait_for_signal().await;
    tracing::info!("shutdown: stopping frontends");

    // actix-web installs its own SIGTERM/SIGINT handler per `HttpServer` and
    // drains each within its `shutdown_timeout`; we only need to tell the
    // non-actix collaborators (gRPC, Controller Manager) to stop, then wait
    // for everything to actually finish, bounded by the same grace period.
    let (grpc_shutdown_tx, grpc_join) = match grpc_shutdown {
        Some((tx, join)) => (Some(tx), Some(join)),
        None => (None, None),
    };
    if let Some(tx) = grpc_shutdown_tx {
        let _ = tx.send(());
    }
    let _ = controller_shutdown.send(());

    let drain_all = async {
        let _ = rest_task.await;
        let _ = health_task.await;
        let _ = metrics_task.await;
        if let Some(join) = grpc_join {
            let _ = join.await;
        }
        let _ = controller_join.await;
    };
    if tokio::time::timeout(grace_period, drain_all).await.is_err() {
        tracing::warn!("shutdown: grace period elapsed before all frontends drained, forcing close");
    }

    // Closed last: in-flight handlers may still be publishing reconciled
    // events to subscribers while the frontends above drain (spec §5).
    broker.close();

    utils::tracing_telemetry::shutdown_tracing();
    Ok(())
}

fn build_auth_config(args: &CliArgs) -> AuthConfig {
    if args.enable_mock {
        tracing::warn!("--enable-mock set: authentication is bypassed");
        return AuthConfig::Disabled;
    }
    if args.enable_authz {
        tracing::warn!("--enable-authz accepted but not enforced: authorization policy is an external collaborator");
    }
    if !args.enable_jwt {
        return AuthConfig::Disabled;
    }
    let keys_file = args.jwks_file.as_ref().map(|p| p.display().to_string());
    let provider = pipeline::jwk::JwkKeyProvider::new(keys_file, args.jwks_url.clone())
        .with_reload_min_wait(args.jwk_reload_min_wait.into());
    AuthConfig::Enabled(Arc::new(provider))
}
