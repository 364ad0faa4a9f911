//! gRPC handlers for the `Fossils` kind (spec §4.11, §6), wrapping
//! [`fossils::service::FossilService`] behind the shared gRPC pipeline.

use std::sync::Arc;

use common_lib::context::RequestContext;
use common_lib::meta::Meta;
use common_lib::pagination::ListArguments;
use common_lib::SvcError;
use fossils::{Fossil, FossilPatch};
use pipeline::grpc::{bearer_from_metadata, GrpcPipelineState};
use tonic::{Request, Response, Status};

use crate::common::{DeleteReply, DeleteRequest, EventType as ProtoEventType, GetRequest, ListRequest, Paging, WatchRequest};
use crate::fossil::fossil_service_server::FossilService as FossilServiceTrait;
use crate::fossil::{CreateFossilRequest, Fossil as ProtoFossil, FossilWatchEvent, ListFossilsReply, UpdateFossilRequest};
use crate::watch::{subscribe_kind, WatchStream};

pub struct FossilGrpcService {
    state: Arc<GrpcPipelineState>,
    service: Arc<fossils::service::FossilService>,
}

impl FossilGrpcService {
    pub fn new(state: Arc<GrpcPipelineState>, service: Arc<fossils::service::FossilService>) -> Self {
        Self { state, service }
    }
}

fn to_proto(fossil: &Fossil) -> ProtoFossil {
    ProtoFossil {
        id: fossil.id().to_string(),
        discovery_location: fossil.discovery_location.clone(),
        estimated_age: fossil.estimated_age,
        fossil_type: fossil.fossil_type.clone(),
        excavator_name: fossil.excavator_name.clone(),
        created_at: fossil.created_at().to_rfc3339(),
        updated_at: fossil.updated_at().to_rfc3339(),
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
impl FossilServiceTrait for FossilGrpcService {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<ProtoFossil>, Status> {
        let full_method = "/fossil.FossilService/Get";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        let fossil = pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            service.get(&ctx, &req.id).await
        })
        .await?;
        Ok(Response::new(to_proto(&fossil)))
    }

    async fn create(&self, request: Request<CreateFossilRequest>) -> Result<Response<ProtoFossil>, Status> {
        let full_method = "/fossil.FossilService/Create";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        let fossil = pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            let fossil = Fossil {
                meta: Meta::new_created(""),
                discovery_location: req.discovery_location,
                estimated_age: req.estimated_age,
                fossil_type: req.fossil_type,
                excavator_name: req.excavator_name,
            };
            service.create(&ctx, fossil).await
        })
        .await?;
        Ok(Response::new(to_proto(&fossil)))
    }

    async fn update(&self, request: Request<UpdateFossilRequest>) -> Result<Response<ProtoFossil>, Status> {
        let full_method = "/fossil.FossilService/Update";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        let fossil = pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            let patch = FossilPatch {
                discovery_location: Some(req.discovery_location),
                estimated_age: req.estimated_age,
                fossil_type: req.fossil_type,
                excavator_name: req.excavator_name,
            };
            service.patch(&ctx, &req.id, patch).await
        })
        .await?;
        Ok(Response::new(to_proto(&fossil)))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteReply>, Status> {
        let full_method = "/fossil.FossilService/Delete";
        let bearer = bearer_from_metadata(request.metadata());
        let req = request.into_inner();
        let service = self.service.clone();
        pipeline::grpc::unary(&self.state, full_method, bearer.as_deref(), move |ctx: Arc<RequestContext>| async move {
            service.delete(&ctx, &req.id).await
        })
        .await?;
        Ok(Response::new(DeleteReply {}))
    }

    async fn list(&self, request: Request<ListRequest>) -> Result<Response<ListFossilsReply>, Status> {
        let full_method = "/fossil.FossilService/List";
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
        Ok(Response::new(ListFossilsReply {
            items: items.iter().map(to_proto).collect(),
            paging: Some(Paging {
                page: paging.page,
                size: paging.size,
                total: paging.total,
            }),
        }))
    }

    type WatchStream = WatchStream<FossilWatchEvent>;

    async fn watch(&self, request: Request<WatchRequest>) -> Result<Response<Self::WatchStream>, Status> {
        let full_method = "/fossil.FossilService/Watch";
        let bearer = bearer_from_metadata(request.metadata());
        let ctx = pipeline::grpc::stream_setup(&self.state, full_method, bearer.as_deref()).await?;

        let service = self.service.clone();
        let dao_store = self.state.store.clone();
        let stream = subscribe_kind(
            self.state.broker.clone(),
            ctx,
            fossils::KIND,
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
                    Ok(Some(FossilWatchEvent {
                        r#type: event_type_to_proto(event.event_type) as i32,
                        resource_id: event.source_id,
                        resource: resource.map(|f| to_proto(&f)),
                    }))
                }
            },
        )?;

        Ok(Response::new(stream))
    }
}

async fn load_for_watch(
    dao_store: &store::Store,
    service: &fossils::service::FossilService,
    ctx: &RequestContext,
    id: &str,
) -> Result<Fossil, SvcError> {
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
