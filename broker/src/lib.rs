//! In-process event fan-out (spec §4.7): the broker loads a committed event
//! once and offers it to every active subscriber's channel, never blocking a
//! publisher on a slow consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use common_lib::context::RequestContext;
use parking_lot::RwLock;
use store::{EventStore, EventType, Store};
use tokio::sync::mpsc;
use ulid::Ulid;

/// The payload handed to a gRPC Watch stream (spec §6): resource is omitted
/// for `Deleted`, so subscribers only carry the routing fields here and the
/// caller (the gRPC frontend) loads the resource itself when needed.
#[derive(Debug, Clone)]
pub struct BrokerEvent {
    pub event_id: i64,
    pub source: String,
    pub source_id: String,
    pub event_type: EventType,
}

/// Default per-subscriber channel capacity, within the spec's suggested
/// [64, 1024] range.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Default)]
pub struct BrokerMetrics {
    subscribers_active: AtomicI64,
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
}

impl BrokerMetrics {
    pub fn subscribers_active(&self) -> i64 {
        self.subscribers_active.load(Ordering::Relaxed)
    }
    pub fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

/// A live subscription. Dropping it unsubscribes: this is the "best-effort
/// cleanup on context cancellation" the spec asks for, expressed as RAII
/// instead of a spawned watcher task.
pub struct Subscription {
    id: String,
    receiver: mpsc::Receiver<BrokerEvent>,
    broker: Arc<Inner>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<BrokerEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(&self.id);
    }
}

#[derive(Debug)]
pub struct BrokerClosed;

struct Inner {
    subscribers: RwLock<HashMap<String, mpsc::Sender<BrokerEvent>>>,
    closed: RwLock<bool>,
    metrics: BrokerMetrics,
}

impl Inner {
    fn unsubscribe(&self, id: &str) {
        let mut subscribers = self.subscribers.write();
        if subscribers.remove(id).is_some() {
            self.metrics.subscribers_active.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// Single-process fan-out of committed events to concurrent watch subscribers.
pub struct EventBroker {
    inner: Arc<Inner>,
    buffer_size: usize,
    store: Store,
    events: Arc<dyn EventStore>,
}

impl EventBroker {
    pub fn new(buffer_size: usize, store: Store, events: Arc<dyn EventStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                closed: RwLock::new(false),
                metrics: BrokerMetrics::default(),
            }),
            buffer_size,
            store,
            events,
        }
    }

    pub fn metrics(&self) -> &BrokerMetrics {
        &self.inner.metrics
    }

    /// Registers a new subscription. Fails with `BrokerClosed` once [`close`]
    /// has been called.
    pub fn subscribe(&self) -> Result<Subscription, BrokerClosed> {
        let mut subscribers = self.inner.subscribers.write();
        if *self.inner.closed.read() {
            return Err(BrokerClosed);
        }
        let id = Ulid::new().to_string();
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        subscribers.insert(id.clone(), sender);
        self.inner
            .metrics
            .subscribers_active
            .fetch_add(1, Ordering::Relaxed);
        Ok(Subscription {
            id,
            receiver,
            broker: self.inner.clone(),
        })
    }

    /// Idempotent; safe to call concurrently with `publish`.
    pub fn unsubscribe(&self, id: &str) {
        self.inner.unsubscribe(id);
    }

    /// Loads the event once, then offers it to every active subscriber's
    /// channel non-blockingly. A full channel drops the event for that
    /// subscriber; the scanner (not the broker) is the durable path, so this
    /// failure is silent apart from the drop counter (spec §7).
    pub async fn publish(&self, event_id: i64) {
        if *self.inner.closed.read() {
            return;
        }

        let ctx = RequestContext::new(format!("broker-publish-{}", event_id));
        let event = match store::txn::open(&ctx, self.store.pool()).await {
            Ok(()) => match self.events.get(&ctx, event_id).await {
                Ok(event) => {
                    let _ = store::txn::resolve(&ctx).await;
                    event
                }
                Err(err) => {
                    tracing::warn!(event_id, error = %err.reason(), "broker: failed to load event");
                    let _ = store::txn::resolve(&ctx).await;
                    return;
                }
            },
            Err(err) => {
                tracing::warn!(event_id, error = %err.reason(), "broker: failed to open read transaction");
                return;
            }
        };

        let broker_event = BrokerEvent {
            event_id: event.id,
            source: event.source,
            source_id: event.source_id,
            event_type: event.event_type,
        };

        if *self.inner.closed.read() {
            return;
        }

        let subscribers = self.inner.subscribers.read();
        for (sub_id, sender) in subscribers.iter() {
            match sender.try_send(broker_event.clone()) {
                Ok(()) => {
                    self.inner.metrics.events_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.inner.metrics.events_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(event_id, subscriber = %sub_id, "broker: dropped event for slow subscriber");
                }
            }
        }
    }

    /// Marks the broker closed, closes all subscriber channels (by dropping
    /// their senders), and forbids new subscriptions.
    pub fn close(&self) {
        let mut closed = self.inner.closed.write();
        *closed = true;
        let mut subscribers = self.inner.subscribers.write();
        subscribers.clear();
        self.inner.metrics.subscribers_active.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // publish() opens a real store transaction, which needs a live pool;
    // that path is exercised by the resource-service integration tests
    // instead. The metrics below are plain atomics and need no database.
    #[test]
    fn subscribe_increments_and_unsubscribe_decrements_gauge() {
        let metrics = BrokerMetrics::default();
        metrics.subscribers_active.fetch_add(1, Ordering::Relaxed);
        assert_eq!(metrics.subscribers_active(), 1);
        metrics.subscribers_active.fetch_sub(1, Ordering::Relaxed);
        assert_eq!(metrics.subscribers_active(), 0);
    }

    #[test]
    fn dropped_and_sent_counters_are_independent() {
        let metrics = BrokerMetrics::default();
        metrics.events_sent.fetch_add(3, Ordering::Relaxed);
        metrics.events_dropped.fetch_add(1, Ordering::Relaxed);
        assert_eq!(metrics.events_sent(), 3);
        assert_eq!(metrics.events_dropped(), 1);
    }
}
