//! The plaintext REST health endpoint, served on its own listener, always
//! unauthenticated and outside the request pipeline (spec §6).

use std::time::Duration;

use actix_web::{App, HttpServer};
use snafu::ResultExt;

use crate::error::{self, ServerError};

pub fn build(addr: &str, shutdown_grace: Duration) -> Result<actix_web::dev::Server, ServerError> {
    let server = HttpServer::new(|| App::new().configure(rest::health::configure))
        .shutdown_timeout(shutdown_grace.as_secs())
        .bind(addr)
        .context(error::HealthBind { addr: addr.to_string() })?
        .run();
    Ok(server)
}
