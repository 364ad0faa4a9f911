//! Background consumer of the event log (spec §4.8): a single cooperative
//! worker scans unreconciled events in ascending id order and dispatches the
//! handlers registered for each event's `(source, event_type)`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common_lib::context::RequestContext;
use common_lib::SvcError;
use parking_lot::RwLock;
use store::{Event, EventStore, EventType, Store};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A kind's reaction to one committed event. Must be idempotent: the event
/// is retried verbatim on the next scan if a prior attempt failed partway.
#[async_trait]
pub trait ControllerHandler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, source_id: &str) -> Result<(), SvcError>;
}

/// Default interval between unreconciled-event scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(2);

type HandlerKey = (String, EventType);

pub struct ControllerManager {
    handlers: RwLock<HashMap<HandlerKey, Vec<Arc<dyn ControllerHandler>>>>,
    store: Store,
    events: Arc<dyn EventStore>,
    scan_interval: Duration,
}

impl ControllerManager {
    pub fn new(store: Store, events: Arc<dyn EventStore>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            store,
            events,
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Registers a handler for `(source, event_type)`. Additive: multiple
    /// handlers for the same key run sequentially in registration order.
    /// Registrations are expected to complete before [`spawn`] runs.
    pub fn register(
        &self,
        source: impl Into<String>,
        event_type: EventType,
        handler: Arc<dyn ControllerHandler>,
    ) {
        self.handlers
            .write()
            .entry((source.into(), event_type))
            .or_insert_with(Vec::new)
            .push(handler);
    }

    /// Spawns the scan loop. The returned sender, when dropped or sent to,
    /// stops the loop after its current scan completes.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, oneshot::Sender<()>) {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.scan_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = self.scan_once().await {
                            tracing::warn!(error = %err.reason(), "controller manager: scan failed");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("controller manager: shutting down");
                        break;
                    }
                }
            }
        });
        (handle, shutdown_tx)
    }

    /// Runs one scan pass. Exposed directly so tests and the startup path
    /// (draining any work left over from a crash) can trigger it synchronously.
    pub async fn scan_once(&self) -> Result<(), SvcError> {
        let since = Utc::now();
        let list_ctx = RequestContext::new("controller-scan");
        store::txn::open(&list_ctx, self.store.pool()).await?;
        let events = self.events.unreconciled_since(&list_ctx, since).await?;
        store::txn::resolve(&list_ctx).await?;

        for event in events {
            self.dispatch_one(&event).await;
        }
        Ok(())
    }

    async fn dispatch_one(&self, event: &Event) {
        let handlers = self
            .handlers
            .read()
            .get(&(event.source.clone(), event.event_type))
            .cloned();

        let ctx = RequestContext::new(format!("controller-event-{}", event.id));
        if let Err(err) = store::txn::open(&ctx, self.store.pool()).await {
            tracing::warn!(event_id = event.id, error = %err.reason(), "controller manager: failed to open transaction");
            return;
        }

        let handlers = match handlers {
            None => {
                if let Err(err) = self.events.mark_reconciled(&ctx, event.id, Utc::now()).await {
                    store::txn::mark_for_rollback(&ctx, err.reason());
                }
                let _ = store::txn::resolve(&ctx).await;
                return;
            }
            Some(handlers) => handlers,
        };

        let mut handler_failed = false;
        for handler in handlers.iter() {
            if let Err(err) = handler.handle(&ctx, &event.source_id).await {
                tracing::warn!(
                    event_id = event.id,
                    source = %event.source,
                    error = %err.reason(),
                    "controller manager: handler failed, event stays unreconciled"
                );
                store::txn::mark_for_rollback(&ctx, err.reason());
                handler_failed = true;
                break;
            }
        }

        if !handler_failed {
            if let Err(err) = self.events.mark_reconciled(&ctx, event.id, Utc::now()).await {
                tracing::warn!(event_id = event.id, error = %err.reason(), "controller manager: failed to mark reconciled");
                store::txn::mark_for_rollback(&ctx, err.reason());
            }
        }

        if let Err(err) = store::txn::resolve(&ctx).await {
            tracing::warn!(event_id = event.id, error = %err.reason(), "controller manager: failed to resolve transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler {
        calls: std::sync::atomic::AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl ControllerHandler for CountingHandler {
        async fn handle(&self, _ctx: &RequestContext, _source_id: &str) -> Result<(), SvcError> {
            let prior = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fail_first && prior == 0 {
                return Err(SvcError::general_error("synthetic failure"));
            }
            Ok(())
        }
    }

    #[test]
    fn registration_is_additive_per_key() {
        // Build the map directly; exercising `register` end to end needs a
        // live `Store`, covered by the resource-service integration tests.
        let handlers: RwLock<HashMap<HandlerKey, Vec<Arc<dyn ControllerHandler>>>> =
            RwLock::new(HashMap::new());
        let key: HandlerKey = ("Dinosaurs".to_string(), EventType::Created);
        let h1: Arc<dyn ControllerHandler> = Arc::new(CountingHandler {
            calls: std::sync::atomic::AtomicUsize::new(0),
            fail_first: false,
        });
        let h2 = h1.clone();
        handlers.write().entry(key.clone()).or_insert_with(Vec::new).push(h1);
        handlers.write().entry(key.clone()).or_insert_with(Vec::new).push(h2);
        assert_eq!(handlers.read().get(&key).unwrap().len(), 2);
    }
}
