//! The request pipeline applied in front of gRPC handlers (spec §4.10): the
//! same ordered chain as the REST middleware, translated to tonic's
//! handler-level integration since `tonic`'s `Interceptor` trait is
//! synchronous and cannot open a database transaction or verify a JWT
//! against a remote JWK set.
//!
//! Streaming calls only run the Recover/Logging/Metrics/Auth subset, per
//! spec: a transaction is not held open across a stream's lifetime.

use std::future::Future;
use std::sync::Arc;

use common_lib::context::RequestContext;
use common_lib::SvcError;
use store::Store;

use crate::auth::{self, AuthConfig};
use crate::logging;
use crate::metrics::PipelineMetrics;
use crate::recover;

/// Shared state every gRPC handler reads from, the gRPC analogue of
/// [`crate::rest::PipelineState`].
pub struct GrpcPipelineState {
    pub store: Store,
    pub metrics: Arc<PipelineMetrics>,
    pub auth: AuthConfig,
    pub broker: Arc<broker::EventBroker>,
}

/// Extracts a bearer token from gRPC request metadata's `authorization` entry.
pub fn bearer_from_metadata(metadata: &tonic::metadata::MetadataMap) -> Option<String> {
    metadata
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(auth::parse_bearer)
        .map(str::to_string)
}

/// Runs a unary handler body behind Recover → OpID+Logging → Metrics →
/// Transaction → Auth, then commits/rolls back and, on a committed write,
/// drains the request's queued publishes onto the broker.
pub async fn unary<T, F, Fut>(
    state: &GrpcPipelineState,
    full_method: &str,
    bearer: Option<&str>,
    body: F,
) -> Result<T, tonic::Status>
where
    F: FnOnce(Arc<RequestContext>) -> Fut,
    Fut: Future<Output = Result<T, SvcError>>,
{
    let op_id = logging::new_op_id();
    let log = logging::RequestLog::start(op_id.clone(), full_method.to_string());
    let ctx = Arc::new(RequestContext::new(op_id.clone()));

    let setup: Result<(), SvcError> = recover::recover(&op_id, async {
        store::txn::open(&ctx, state.store.pool()).await?;
        auth::authenticate(&state.auth, bearer, &ctx).await?;
        Ok(())
    })
    .await;

    if let Err(err) = setup {
        // Auth runs after the transaction is opened; a failure here still
        // leaves one bound to `ctx` and must resolve it.
        store::txn::mark_for_rollback(&ctx, "setup failed before the handler ran");
        if let Err(resolve_err) = store::txn::resolve(&ctx).await {
            tracing::warn!(op_id = %op_id, error = %resolve_err.reason(), "grpc pipeline: failed to resolve transaction after setup failure");
        }
        let status = err.http_status().as_u16();
        log.finish(status);
        state.metrics.observe(full_method, status, log.elapsed());
        return Err(err.grpc_status());
    }

    let outcome = recover::recover(&op_id, body(ctx.clone())).await;

    if outcome.is_err() {
        store::txn::mark_for_rollback(&ctx, "handler returned an error");
    }
    let committed = outcome.is_ok();

    match store::txn::resolve(&ctx).await {
        Ok(()) if committed => {
            for event_id in ctx.take_pending_publishes() {
                let broker = state.broker.clone();
                tokio::spawn(async move {
                    broker.publish(event_id).await;
                });
            }
        }
        Err(err) => {
            tracing::warn!(op_id = %op_id, error = %err.reason(), "grpc pipeline: failed to resolve transaction");
        }
        Ok(()) => {}
    }

    match outcome {
        Ok(value) => {
            log.finish(200);
            state.metrics.observe(full_method, 200, log.elapsed());
            Ok(value)
        }
        Err(err) => {
            let status = err.http_status().as_u16();
            log.finish(status);
            state.metrics.observe(full_method, status, log.elapsed());
            Err(err.grpc_status())
        }
    }
}

/// Runs the Recover/Logging/Metrics/Auth subset for a `Watch` stream setup
/// (spec §4.10): authenticates and hands back a context for the stream's
/// subscription, without opening a transaction.
pub async fn stream_setup(
    state: &GrpcPipelineState,
    full_method: &str,
    bearer: Option<&str>,
) -> Result<Arc<RequestContext>, tonic::Status> {
    let op_id = logging::new_op_id();
    let log = logging::RequestLog::start(op_id.clone(), full_method.to_string());
    let ctx = Arc::new(RequestContext::new(op_id.clone()));

    let result = recover::recover(&op_id, auth::authenticate(&state.auth, bearer, &ctx)).await;

    match result {
        Ok(()) => {
            log.finish(200);
            state.metrics.observe(full_method, 200, log.elapsed());
            Ok(ctx)
        }
        Err(err) => {
            let status = err.http_status().as_u16();
            log.finish(status);
            state.metrics.observe(full_method, status, log.elapsed());
            Err(err.grpc_status())
        }
    }
}
