//! The request pipeline wired as `actix-web` middleware (spec §4.10): every
//! REST request runs Recover → OpID+Logging → Metrics → Transaction → Auth,
//! in that order, before reaching the route handler.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpResponse};
use broker::EventBroker;
use common_lib::context::RequestContext;
use common_lib::error::ErrorPresenter;
use common_lib::SvcError;
use futures::future::LocalBoxFuture;
use store::Store;

use crate::auth::{self, AuthConfig};
use crate::logging;
use crate::metrics::PipelineMetrics;
use crate::recover;

/// Shared state every pipelined request reads from. One instance per
/// server, built once at startup and cloned behind an `Arc` into each
/// middleware invocation.
pub struct PipelineState {
    pub store: Store,
    pub metrics: Arc<PipelineMetrics>,
    pub auth: AuthConfig,
    pub broker: Arc<EventBroker>,
    /// Path prefixes exempt from transaction scoping and auth (health, reflection).
    pub exempt_prefixes: Vec<String>,
}

impl PipelineState {
    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// The `actix-web` `Transform` that installs [`PipelineMiddleware`].
pub struct Pipeline {
    state: Arc<PipelineState>,
}

impl Pipeline {
    pub fn new(state: Arc<PipelineState>) -> Self {
        Self { state }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Pipeline
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = PipelineMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PipelineMiddleware {
            service: Rc::new(service),
            state: self.state.clone(),
        }))
    }
}

pub struct PipelineMiddleware<S> {
    service: Rc<S>,
    state: Arc<PipelineState>,
}

impl<S, B> Service<ServiceRequest> for PipelineMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let state = self.state.clone();

        Box::pin(async move {
            let op_id = logging::new_op_id();
            let method = format!("{} {}", req.method(), req.path());
            let log = logging::RequestLog::start(op_id.clone(), method.clone());
            let exempt = state.is_exempt(req.path());
            let ctx = Arc::new(RequestContext::new(op_id.clone()));

            let bearer = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(auth::parse_bearer)
                .map(str::to_string);

            let setup: Result<(), SvcError> = recover::recover(&op_id, async {
                if !exempt {
                    store::txn::open(&ctx, state.store.pool()).await?;
                    auth::authenticate(&state.auth, bearer.as_deref(), &ctx).await?;
                }
                Ok(())
            })
            .await;

            if let Err(err) = setup {
                // Auth runs after the transaction is opened; a failure here
                // still leaves one bound to `ctx` and must resolve it.
                store::txn::mark_for_rollback(&ctx, "setup failed before the handler ran");
                if let Err(resolve_err) = store::txn::resolve(&ctx).await {
                    tracing::warn!(op_id = %op_id, error = %resolve_err.reason(), "pipeline: failed to resolve transaction after setup failure");
                }
                let status = err.http_status();
                log.finish(status.as_u16());
                state.metrics.observe(&method, status.as_u16(), log.elapsed());
                let response = error_response(&err, &op_id);
                return Ok(req.into_response(response).map_into_right_body());
            }

            req.extensions_mut().insert(ctx.clone());
            // `service.call` consumes `req`; keep a cheap handle around so an
            // error produced after the call still has a request to attach to.
            let http_req = req.request().clone();

            let outcome = recover::recover(&op_id, async {
                service
                    .call(req)
                    .await
                    .map_err(|e| SvcError::general_error(e.to_string()))
            })
            .await;

            if !exempt {
                if outcome.is_err() {
                    store::txn::mark_for_rollback(&ctx, "handler returned an error");
                }
                let committed = outcome.is_ok();
                if let Err(err) = store::txn::resolve(&ctx).await {
                    tracing::warn!(op_id = %op_id, error = %err.reason(), "pipeline: failed to resolve transaction");
                } else if committed {
                    // Only fire after a successful commit: the broker loads the
                    // event from the store, so publishing earlier could race a
                    // subscriber against a row that isn't visible yet.
                    for event_id in ctx.take_pending_publishes() {
                        let broker = state.broker.clone();
                        tokio::spawn(async move {
                            broker.publish(event_id).await;
                        });
                    }
                }
            }

            match outcome {
                Ok(res) => {
                    let status = res.status().as_u16();
                    log.finish(status);
                    state.metrics.observe(&method, status, log.elapsed());
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    let status = err.http_status();
                    log.finish(status.as_u16());
                    state.metrics.observe(&method, status.as_u16(), log.elapsed());
                    let response = error_response(&err, &op_id);
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

fn error_response(err: &SvcError, op_id: &str) -> HttpResponse {
    let presenter = ErrorPresenter::new(err, Some(op_id.to_string()));
    HttpResponse::build(err.http_status()).json(presenter)
}
