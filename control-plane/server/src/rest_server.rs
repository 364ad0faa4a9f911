//! The versioned REST API listener (spec §6): dinosaur/fossil routes wired
//! behind [`pipeline::Pipeline`], mounted under the configured base path.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use dinosaurs::service::DinosaurService;
use fossils::service::FossilService;
use pipeline::rest::PipelineState;
use pipeline::Pipeline;
use rest::RestConfig;
use snafu::ResultExt;

use crate::env::RestRouteCtx;
use crate::error::{self, ServerError};

#[allow(clippy::too_many_arguments)]
pub fn build(
    addr: &str,
    tls_config: Option<rustls::ServerConfig>,
    pipeline_state: Arc<PipelineState>,
    dinosaur_service: Arc<DinosaurService>,
    fossil_service: Arc<FossilService>,
    rest_config: RestConfig,
    rest_routes: RestRouteCtx,
    shutdown_grace: Duration,
) -> Result<actix_web::dev::Server, ServerError> {
    let base_path = rest_config.base_path.clone();

    let http_server = HttpServer::new(move || {
        let rest_routes = rest_routes.clone();
        App::new()
            .app_data(web::Data::new(dinosaur_service.clone()))
            .app_data(web::Data::new(fossil_service.clone()))
            .app_data(web::Data::new(rest_config.clone()))
            .wrap(Pipeline::new(pipeline_state.clone()))
            .service(web::scope(&rest_config.base_path).configure(move |cfg| rest_routes.apply(cfg)))
    })
    .shutdown_timeout(shutdown_grace.as_secs());

    let server = match tls_config {
        Some(config) => http_server
            .bind_rustls(addr, config)
            .context(error::RestBind { addr: addr.to_string() })?,
        None => http_server.bind(addr).context(error::RestBind { addr: addr.to_string() })?,
    };

    tracing::info!(%addr, base_path = %base_path, "REST frontend listening");
    Ok(server.run())
}
