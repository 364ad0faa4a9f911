//! gRPC handlers for the `Dinosaurs` kind (spec §4.11, §6), wrapping
//! [`dinosaurs::service::DinosaurService`] behind the shared gRPC pipeline.

use std::sync::Arc;

use common_lib::context::RequestContext;
use common_lib::meta::Meta;
use common_lib::pagination::ListArguments;
use common_lib::SvcError;
use dinosaurs::{Dinosaur, DinosaurPatch};
use pipeline::grpc::{bearer_from_metadata, GrpcPipelineState};
use tonic::{Request, Response, Status};

use crate::common::{DeleteReply, DeleteRequest, EventType as ProtoEventType, GetRequest, ListRequest, Paging, WatchRequest};
use crate::dinosaur::dinosaur_service_server::DinosaurService as DinosaurServiceTrait;
use crate::dinosaur::{
    CreateDinosaurRequest, Dinosaur as ProtoDinosaur, DinosaurWatchEvent, ListDinosaursReply, UpdateDinosaurRequest,
};
use crate::watch::{subscribe_kind, WatchStream};

pub struct DinosaurGrpcService {
    state: Arc<GrpcPipelineState>,
    service: Arc<dinosaurs::service::DinosaurService>,
}

impl DinosaurGrpcService {
    pub fn new(state: Arc<GrpcPipelineState>, service: Arc<dinosaurs::service::DinosaurService>) -> Self {
        Self { state, service }
    }
}

fn to_proto(dinosaur: &Dinosaur) -> ProtoDinosaur {
    ProtoDinosaur {
        id: dinosaur.id().to_string(),
        species: dinosaur.species.clone(),
        created_at: dinosaur.created_at().to_rfc3339(),
        updated_at: dinosaur.updated_at().to_rfc3339(),
    }
}

fn event_type_to_proto(event_type: store::EventType) -> ProtoEventType {
    match event_type {
        store::EventType::Created => ProtoEventType::Created,
        store::EventType::Updated => ProtoEventType::Updated,
        store::EventType::Deleted => ProtoEventType::Deleted,
    }
}

#[tonic::async_trait]
impl DinosaurServiceTrait for DinosaurGrpcService {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<ProtoDinosaur>, Status> {
        let full_method = "/dinosaur.DinosaurService/Get";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        let dinosaur = pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            service.get(&ctx, &req.id).await
        })
        .await?;
        Ok(Response::new(to_proto(&dinosaur)))
    }

    async fn create(&self, request: Request<CreateDinosaurRequest>) -> Result<Response<ProtoDinosaur>, Status> {
        let full_method = "/dinosaur.DinosaurService/Create";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        let dinosaur = pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            let dinosaur = Dinosaur {
                meta: Meta::new_created(""),
                species: req.species,
            };
            service.create(&ctx, dinosaur).await
        })
        .await?;
        Ok(Response::new(to_proto(&dinosaur)))
    }

    async fn update(&self, request: Request<UpdateDinosaurRequest>) -> Result<Response<ProtoDinosaur>, Status> {
        let full_method = "/dinosaur.DinosaurService/Update";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        let dinosaur = pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            let patch = DinosaurPatch {
                species: Some(req.species),
            };
            service.patch(&ctx, &req.id, patch).await
        })
        .await?;
        Ok(Response::new(to_proto(&dinosaur)))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteReply>, Status> {
        let full_method = "/dinosaur.DinosaurService/Delete";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            service.delete(&ctx, &req.id).await
        })
        .await?;
        Ok(Response::new(DeleteReply {}))
    }

    async fn list(&self, request: Request<ListRequest>) -> Result<Response<ListDinosaursReply>, Status> {
        let full_method = "/dinosaur.DinosaurService/List";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        let (items, paging) = pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            let args = ListArguments::new(
                req.page,
                req.size,
                none_if_empty(req.search),
                none_if_empty(req.order_by),
                None,
            );
            service.list(&ctx, &args).await
        })
        .await?;
        Ok(Response::new(ListDinosaursReply {
            items: items.iter().map(to_proto).collect(),
            paging: Some(Paging {
                page: paging.page,
                size: paging.size,
                total: paging.total,
            }),
        }))
    }

    type WatchStream = WatchStream<DinosaurWatchEvent>;

    async fn watch(&self, request: Request<WatchRequest>) -> Result<Response<Self::WatchStream>, Status> {
        let full_method = "/dinosaur.DinosaurService/Watch";
        let bearer = bearer_from_metadata(request.metadata());
        let ctx = pipeline::grpc::stream_setup(&self.state, full_method, bearer.as_deref()).await?;

        let service = self.service.clone();
        let dao_store = self.state.store.clone();
        let stream = subscribe_kind(
            self.state.broker.clone(),
            ctx,
            dinosaurs::KIND,
            move |ctx, event| {
                let service = service.clone();
                let dao_store = dao_store.clone();
                async move {
                    let resource = match event.event_type {
                        store::EventType::Deleted => None,
                        store::EventType::Created | store::EventType::Updated => {
                            Some(load_for_watch(&dao_store, &service, &ctx, &event.source_id).await?)
                        }
                    };
                    Ok(Some(DinosaurWatchEvent {
                        r#type: event_type_to_proto(event.event_type) as i32,
                        resource_id: event.source_id,
                        resource: resource.map(|d| to_proto(&d)),
                    }))
                }
            },
        )?;

        Ok(Response::new(stream))
    }
}

async fn load_for_watch(
    dao_store: &store::Store,
    service: &dinosaurs::service::DinosaurService,
    ctx: &RequestContext,
    id: &str,
) -> Result<Dinosaur, SvcError> {
    store::txn::open(ctx, dao_store.pool()).await?;
    let result = service.get(ctx, id).await;
    let _ = store::txn::resolve(ctx).await;
    result
}

fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
