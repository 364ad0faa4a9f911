//! Per-request unit-of-work (spec §4.2): one transaction bound to a
//! `RequestContext` for its entire lifetime, resolved exactly once by the
//! outermost pipeline middleware.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use common_lib::context::TxnHandle;
use common_lib::{RequestContext, SvcError};
use snafu::ResultExt;
use sqlx::{PgPool, Postgres};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{self, StoreError};

/// The unit-of-work handle installed on a `RequestContext` by [`open`].
///
/// Holds the live `sqlx` transaction behind a lock so DAO code on the same
/// task (and the pipeline's resolving middleware) can share it without
/// threading it through every call explicitly.
pub struct Transaction {
    inner: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
    rollback: AtomicBool,
}

impl Transaction {
    /// Locks the held transaction. `None` once resolved.
    pub async fn lock(&self) -> MutexGuard<'_, Option<sqlx::Transaction<'static, Postgres>>> {
        self.inner.lock().await
    }

    fn mark_for_rollback(&self) {
        self.rollback.store(true, AtomicOrdering::SeqCst);
    }

    fn should_rollback(&self) -> bool {
        self.rollback.load(AtomicOrdering::SeqCst)
    }
}

impl TxnHandle for Transaction {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Opens a fresh unit-of-work against `pool` and binds it to `ctx`.
/// Fails with `Unavailable` if the pool cannot vend a connection.
pub async fn open(ctx: &RequestContext, pool: &PgPool) -> Result<(), SvcError> {
    let tx = pool.begin().await.context(error::BeginTxn)?;
    ctx.set_txn(Arc::new(Transaction {
        inner: Mutex::new(Some(tx)),
        rollback: AtomicBool::new(false),
    }));
    Ok(())
}

/// Flags the open unit-of-work for rollback. Idempotent; a no-op if no
/// transaction is open (callable defensively from error paths).
pub fn mark_for_rollback(ctx: &RequestContext, cause: impl std::fmt::Display) {
    if let Some(txn) = ctx.txn_as::<Transaction>() {
        tracing::debug!(reason = %cause, "marking transaction for rollback");
        txn.mark_for_rollback();
    }
}

/// Resolves the unit-of-work bound to `ctx`: commits if it was never flagged
/// for rollback, rolls back otherwise. Must run exactly once per `open`, on
/// every exit path, including panics recovered by the pipeline.
pub async fn resolve(ctx: &RequestContext) -> Result<(), SvcError> {
    let txn = match ctx.txn_as::<Transaction>() {
        Some(txn) => txn,
        None => return Ok(()),
    };
    let inner = {
        let mut guard = txn.lock().await;
        guard.take()
    };
    ctx.clear_txn();
    let inner = match inner {
        Some(inner) => inner,
        None => return Err(StoreError::AlreadyResolved.into()),
    };
    if txn.should_rollback() {
        inner.rollback().await.context(error::Rollback)?;
    } else {
        inner.commit().await.context(error::Commit)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_transaction_does_not_roll_back() {
        let txn = Transaction {
            inner: Mutex::new(None),
            rollback: AtomicBool::new(false),
        };
        assert!(!txn.should_rollback());
        txn.mark_for_rollback();
        assert!(txn.should_rollback());
    }
}
