//! REST handlers for the `Fossils` kind (spec §6), thin adapters over
//! [`fossils::service::FossilService`].

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use common_lib::context::RequestContext;
use common_lib::pagination::ListArguments;
use fossils::service::FossilService;
use fossils::{Fossil, FossilPatch};
use serde::{Deserialize, Serialize};

use crate::config::RestConfig;
use crate::error::RestError;
use crate::query::{project_fields, ListQuery};

const KINDS: &str = "fossils";

#[derive(Debug, Serialize)]
struct FossilPresenter {
    kind: &'static str,
    id: String,
    href: String,
    created_at: String,
    updated_at: String,
    discovery_location: String,
    estimated_age: Option<i32>,
    fossil_type: Option<String>,
    excavator_name: Option<String>,
}

impl FossilPresenter {
    fn new(cfg: &RestConfig, f: &Fossil) -> Self {
        Self {
            kind: "Fossil",
            id: f.id().to_string(),
            href: cfg.href(KINDS, f.id()),
            created_at: f.created_at().to_rfc3339(),
            updated_at: f.updated_at().to_rfc3339(),
            discovery_location: f.discovery_location.clone(),
            estimated_age: f.estimated_age,
            fossil_type: f.fossil_type.clone(),
            excavator_name: f.excavator_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FossilListPresenter {
    kind: &'static str,
    page: u32,
    size: u32,
    total: u64,
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CreateFossilBody {
    discovery_location: String,
    estimated_age: Option<i32>,
    fossil_type: Option<String>,
    excavator_name: Option<String>,
}

async fn list_fossils(
    service: web::Data<Arc<FossilService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, RestError> {
    let args: ListArguments = query.into_inner().into();
    let fields = args.fields.clone();
    let (items, paging) = service.list(&ctx, &args).await?;
    Ok(HttpResponse::Ok().json(FossilListPresenter {
        kind: "FossilList",
        page: paging.page,
        size: paging.size,
        total: paging.total,
        items: items
            .iter()
            .map(|f| project_fields(&FossilPresenter::new(&cfg, f), fields.as_deref()))
            .collect(),
    }))
}

async fn get_fossil(
    service: web::Data<Arc<FossilService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    id: web::Path<String>,
) -> Result<HttpResponse, RestError> {
    let fossil = service.get(&ctx, &id).await?;
    Ok(HttpResponse::Ok().json(FossilPresenter::new(&cfg, &fossil)))
}

async fn create_fossil(
    service: web::Data<Arc<FossilService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    body: web::Json<CreateFossilBody>,
) -> Result<HttpResponse, RestError> {
    let body = body.into_inner();
    let fossil = Fossil {
        meta: common_lib::meta::Meta::new_created(""),
        discovery_location: body.discovery_location,
        estimated_age: body.estimated_age,
        fossil_type: body.fossil_type,
        excavator_name: body.excavator_name,
    };
    let created = service.create(&ctx, fossil).await?;
    Ok(HttpResponse::Created().json(FossilPresenter::new(&cfg, &created)))
}

async fn patch_fossil(
    service: web::Data<Arc<FossilService>>,
    cfg: web::Data<RestConfig>,
    ctx: web::ReqData<Arc<RequestContext>>,
    id: web::Path<String>,
    body: web::Json<FossilPatch>,
) -> Result<HttpResponse, RestError> {
    let patched = service.patch(&ctx, &id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(FossilPresenter::new(&cfg, &patched)))
}

async fn delete_fossil(
    service: web::Data<Arc<FossilService>>,
    ctx: web::ReqData<Arc<RequestContext>>,
    id: web::Path<String>,
) -> Result<HttpResponse, RestError> {
    service.delete(&ctx, &id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Mounts `/fossils` and `/fossils/{id}` onto the scope this is `.configure`d into.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/fossils")
            .route(web::get().to(list_fossils))
            .route(web::post().to(create_fossil)),
    )
    .service(
        web::resource("/fossils/{id}")
            .route(web::get().to(get_fossil))
            .route(web::patch().to(patch_fossil))
            .route(web::delete().to(delete_fossil)),
    );
}
