//! Shared plumbing for a kind's `Watch` server-streaming rpc (spec §6,
//! §9 "Watch-stream cycles"): subscribe to the broker, filter to one kind,
//! and hand each surviving event to a kind-specific loader that turns it
//! into the wire watch-event type.
//!
//! Dropping the returned stream drops the underlying [`broker::Subscription`],
//! which unsubscribes on `Drop` — the cycle-breaking cleanup the spec calls
//! for happens for free via RAII, with no separate "cancel" step to wire up.

use std::pin::Pin;
use std::sync::Arc;

use broker::{BrokerEvent, EventBroker};
use common_lib::context::RequestContext;
use futures::stream::{self, Stream};

pub type WatchStream<T> = Pin<Box<dyn Stream<Item = Result<T, tonic::Status>> + Send + 'static>>;

/// Subscribes to `broker`, keeps only events whose `source` matches `kind`,
/// and maps each through `to_proto`. `to_proto` returning `Ok(None)` skips
/// the event without ending the stream (reserved for future filtering).
pub fn subscribe_kind<T, F, Fut>(
    broker: Arc<EventBroker>,
    ctx: Arc<RequestContext>,
    kind: &'static str,
    to_proto: F,
) -> Result<WatchStream<T>, tonic::Status>
where
    T: Send + 'static,
    F: Fn(Arc<RequestContext>, BrokerEvent) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Option<T>, common_lib::SvcError>> + Send + 'static,
{
    let subscription = broker
        .subscribe()
        .map_err(|_| tonic::Status::unavailable("event broker is shut down"))?;

    let to_proto = Arc::new(to_proto);
    let state = (subscription, ctx, to_proto, kind);

    let stream = stream::unfold(state, move |(mut subscription, ctx, to_proto, kind)| async move {
        loop {
            let event = subscription.recv().await?;
            if event.source != kind {
                continue;
            }
            return match to_proto(ctx.clone(), event).await {
                Ok(Some(item)) => Some((Ok(item), (subscription, ctx, to_proto, kind))),
                Ok(None) => continue,
                Err(err) => Some((Err(err.grpc_status()), (subscription, ctx, to_proto, kind))),
            };
        }
    });

    Ok(Box::pin(stream))
}
