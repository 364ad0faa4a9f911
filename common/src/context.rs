//! Per-request state threaded through the pipeline and into service/DAO code.
//!
//! `store` depends on `common`, not the reverse, so the transaction handle is
//! carried behind a type-erased marker trait here and downcast back to the
//! concrete `store::Transaction` where it's actually used.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

/// Implemented by whatever the store layer uses as its unit-of-work handle.
///
/// `common` only needs to move this around and hand it back; it never
/// inspects it, which is what keeps `store` from having to depend on `common`
/// for anything beyond this trait.
pub trait TxnHandle: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// State scoped to a single inbound request, created by the pipeline before
/// any handler runs and dropped once the response has been sent.
pub struct RequestContext {
    op_id: String,
    username: RwLock<Option<String>>,
    txn: RwLock<Option<Arc<dyn TxnHandle>>>,
    /// Event ids appended by a Resource Service during this request, queued
    /// for low-latency Broker delivery once the pipeline's transaction
    /// middleware confirms the surrounding unit-of-work actually committed
    /// (spec §4.8: "the Resource Service commits a mutation, it publishes").
    pending_publishes: RwLock<Vec<i64>>,
}

impl RequestContext {
    pub fn new(op_id: impl Into<String>) -> Self {
        Self {
            op_id: op_id.into(),
            username: RwLock::new(None),
            txn: RwLock::new(None),
            pending_publishes: RwLock::new(Vec::new()),
        }
    }

    /// Queues an event id for Broker delivery after the pipeline commits.
    pub fn queue_publish(&self, event_id: i64) {
        self.pending_publishes.write().push(event_id);
    }

    /// Drains the queued event ids. Called once by the outermost pipeline
    /// middleware right after a successful commit.
    pub fn take_pending_publishes(&self) -> Vec<i64> {
        std::mem::take(&mut self.pending_publishes.write())
    }

    pub fn op_id(&self) -> &str {
        &self.op_id
    }

    pub fn username(&self) -> Option<String> {
        self.username.read().clone()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        *self.username.write() = Some(username.into());
    }

    /// Installed by the transaction-scoping middleware once a unit of work is opened.
    pub fn set_txn(&self, txn: Arc<dyn TxnHandle>) {
        *self.txn.write() = Some(txn);
    }

    pub fn clear_txn(&self) {
        *self.txn.write() = None;
    }

    pub fn txn(&self) -> Option<Arc<dyn TxnHandle>> {
        self.txn.read().clone()
    }

    /// Downcasts the current unit-of-work handle to a concrete store type.
    /// Returns `None` if no transaction is open or the type doesn't match.
    pub fn txn_as<T: 'static>(&self) -> Option<Arc<T>> {
        let txn = self.txn()?;
        if txn.as_any().is::<T>() {
            let raw = Arc::into_raw(txn) as *const T;
            // Safety: the `is::<T>()` check above guarantees the erased type
            // matches `T`, and the Arc strong count is preserved across the
            // raw round-trip.
            Some(unsafe { Arc::from_raw(raw) })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(u32);
    impl TxnHandle for Fake {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn username_round_trips() {
        let ctx = RequestContext::new("op-1");
        assert_eq!(ctx.username(), None);
        ctx.set_username("alice");
        assert_eq!(ctx.username().as_deref(), Some("alice"));
    }

    #[test]
    fn pending_publishes_drain_once() {
        let ctx = RequestContext::new("op-3");
        ctx.queue_publish(1);
        ctx.queue_publish(2);
        assert_eq!(ctx.take_pending_publishes(), vec![1, 2]);
        assert!(ctx.take_pending_publishes().is_empty());
    }

    #[test]
    fn txn_downcasts_to_concrete_type() {
        let ctx = RequestContext::new("op-2");
        assert!(ctx.txn().is_none());
        ctx.set_txn(Arc::new(Fake(7)));
        let fake = ctx.txn_as::<Fake>().expect("txn should downcast");
        assert_eq!(fake.0, 7);
        ctx.clear_txn();
        assert!(ctx.txn().is_none());
    }
}
