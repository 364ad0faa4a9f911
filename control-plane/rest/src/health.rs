//! Plaintext REST health endpoint (spec §6: "REST health is a separate
//! plaintext endpoint"), always unauthenticated.

use actix_web::{web, HttpResponse};

async fn healthz() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(healthz));
}
