//! REST handlers for the `Dinosaurs` kind (spec §6), thin adapters over
//! [`dinosaurs::service::DinosaurService`].

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use common_lib::context::RequestContext;
use common_lib::pagination::ListArguments;
use dinosaurs::service::DinosaurService;
use dinosaurs::{Dinosaur, DinosaurPatch};
use serde::{Deserialize, Serialize};

use crate::config::RestConfig;
use crate::error::RestError;
use crate::query::{project_fields, ListQuery};

const KINDS: &str = "dinosaurs";

#[derive(Debug, Serialize)]
struct DinosaurPresenter {
    kind: &'static str,
    id: String,
    href: String,
    created_at: String,
    updated_at: String,
    species: String,
}

impl DinosaurPresenter {
    fn new(cfg: &RestConfig, d: &Dinosaur) -> Self {
        Self {
            kind: "Dinosaur",
            id: d.id().to_string(),
            href: cfg.href(KINDS, d.id()),
            created_at: d.created_at().to_rfc3339(),
            updated_at: d.updated_at().to_rfc3339(),
            species: d.species.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DinosaurListPresenter {
    kind: &'static str,
    page: u32,
    size: u32,
    total: u64,
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CreateDinosaurBody {
    species: String,
}

async fn list_dinosaurs(
    service: web::Data<Arc<DinosaurService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, RestError> {
    let args: ListArguments = query.into_inner().into();
    let fields = args.fields.clone();
    let (items, paging) = service.list(&ctx, &args).await?;
    Ok(HttpResponse::Ok().json(DinosaurListPresenter {
        kind: "DinosaurList",
        page: paging.page,
        size: paging.size,
        total: paging.total,
        items: items
            .iter()
            .map(|d| project_fields(&DinosaurPresenter::new(&cfg, d), fields.as_deref()))
            .collect(),
    }))
}

async fn get_dinosaur(
    service: web::Data<Arc<DinosaurService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    id: web::Path<String>,
) -> Result<HttpResponse, RestError> {
    let dinosaur = service.get(&ctx, &id).await?;
    Ok(HttpResponse::Ok().json(DinosaurPresenter::new(&cfg, &dinosaur)))
}

async fn create_dinosaur(
    service: web::Data<Arc<DinosaurService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    body: web::Json<CreateDinosaurBody>,
) -> Result<HttpResponse, RestError> {
    let dinosaur = Dinosaur {
        meta: common_lib::meta::Meta::new_created(""),
        species: body.into_inner().species,
    };
    let created = service.create(&ctx, dinosaur).await?;
    Ok(HttpResponse::Created().json(DinosaurPresenter::new(&cfg, &created)))
}

async fn patch_dinosaur(
    service: web::Data<Arc<DinosaurService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    id: web::Path<String>,
    body: web::Json<DinosaurPatch>,
) -> Result<HttpResponse, RestError> {
    let patched = service.patch(&ctx, &id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DinosaurPresenter::new(&cfg, &patched)))
}

async fn delete_dinosaur(
    service: web::Data<Arc<DinosaurService>>,
    ctx: web::ReqData<Arc<RequestContext>>,
    id: web::Path<String>,
) -> Result<HttpResponse, RestError> {
    service.delete(&ctx, &id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Mounts `/dinosaurs` and `/dinosaurs/{id}` onto the scope this is `.configure`d into.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/dinosaurs")
            .route(web::get().to(list_dinosaurs))
            .route(web::post().to(create_dinosaur)),
    )
    .service(
        web::resource("/dinosaurs/{id}")
            .route(web::get().to(get_dinosaur))
            .route(web::patch().to(patch_dinosaur))
            .route(web::delete().to(delete_dinosaur)),
    );
}
