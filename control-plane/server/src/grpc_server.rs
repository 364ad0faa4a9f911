//! The gRPC frontend (spec §6, enabled by `--enable-grpc`): Dinosaur and
//! Fossil services plus the always-unauthenticated health and reflection
//! services. Wired directly here rather than through the `Registry`'s gRPC
//! bucket: `tonic::transport::server::Router<L>` changes type with every
//! `add_service` call, so the generic accumulator trick used for REST
//! routes in [`crate::env::RestRouteCtx`] doesn't type-erase it (DESIGN.md).

use std::net::SocketAddr;
use std::sync::Arc;

use dinosaurs::service::DinosaurService;
use fossils::service::FossilService;
use grpc::dinosaur::dinosaur_service_server::DinosaurServiceServer;
use grpc::fossil::fossil_service_server::FossilServiceServer;
use grpc::{DinosaurGrpcService, FossilGrpcService};
use pipeline::grpc::GrpcPipelineState;
use snafu::ResultExt;
use tokio::sync::oneshot;
use tonic::transport::{Identity, Server, ServerTlsConfig};

use crate::error::{self, ServerError};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    addr: SocketAddr,
    state: Arc<GrpcPipelineState>,
    dinosaur_service: Arc<DinosaurService>,
    fossil_service: Arc<FossilService>,
    identity: Option<Identity>,
    shutdown: oneshot::Receiver<()>,
) -> Result<(), ServerError> {
    let (mut health_reporter, health_service) = grpc::health::health_reporter();
    health_reporter.set_serving::<DinosaurServiceServer<DinosaurGrpcService>>().await;
    health_reporter.set_serving::<FossilServiceServer<FossilGrpcService>>().await;

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(grpc::FILE_DESCRIPTOR_SET)
        .build()
        .expect("gRPC reflection service descriptor set is built into the binary");

    let dinosaur_grpc = DinosaurServiceServer::new(DinosaurGrpcService::new(state.clone(), dinosaur_service));
    let fossil_grpc = FossilServiceServer::new(FossilGrpcService::new(state, fossil_service));

    let mut builder = Server::builder();
    if let Some(identity) = identity {
        builder = builder
            .tls_config(ServerTlsConfig::new().identity(identity))
            .context(error::GrpcTls)?;
    }

    tracing::info!(%addr, "gRPC frontend listening");
    builder
        .add_service(health_service)
        .add_service(reflection_service)
        .add_service(dinosaur_grpc)
        .add_service(fossil_grpc)
        .serve_with_shutdown(addr, async {
            let _ = shutdown.await;
            tracing::info!("gRPC frontend: shutdown signal received");
        })
        .await
        .context(error::GrpcTls)?;

    Ok(())
}
