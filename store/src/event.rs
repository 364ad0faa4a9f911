//! The append-only event log (spec §4.4): the durable record of every
//! resource mutation, and the source of truth the Controller Manager
//! scans for work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_lib::{RequestContext, SvcError};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::txn::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

/// A single row of the append-only event log. Immutable once written
/// except for `reconciled_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub source: String,
    pub source_id: String,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    pub reconciled_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a row inside the caller's open transaction.
    async fn append(
        &self,
        ctx: &RequestContext,
        source: &str,
        source_id: &str,
        event_type: EventType,
    ) -> Result<Event, SvcError>;

    async fn get(&self, ctx: &RequestContext, id: i64) -> Result<Event, SvcError>;

    /// Events with `reconciled_at IS NULL OR reconciled_at < since`, ordered
    /// ascending by id (approximates creation order).
    async fn unreconciled_since(
        &self,
        ctx: &RequestContext,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, SvcError>;

    async fn mark_reconciled(
        &self,
        ctx: &RequestContext,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), SvcError>;
}

pub struct PgEventStore;

impl PgEventStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PgEventStore {
    fn default() -> Self {
        Self::new()
    }
}

fn no_txn() -> SvcError {
    SvcError::general_error("no open transaction for event store operation")
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        ctx: &RequestContext,
        source: &str,
        source_id: &str,
        event_type: EventType,
    ) -> Result<Event, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let event_type_str = event_type.to_string();
        let row: (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO events (source, source_id, event_type, created_at, reconciled_at)
            VALUES ($1, $2, $3, now(), NULL)
            RETURNING id, created_at
            "#,
        )
        .bind(source)
        .bind(source_id)
        .bind(&event_type_str)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| crate::error::classify_sqlx_error(source, source_id, e))?;
        Ok(Event {
            id: row.0,
            source: source.to_string(),
            source_id: source_id.to_string(),
            event_type,
            created_at: row.1,
            reconciled_at: None,
        })
    }

    async fn get(&self, ctx: &RequestContext, id: i64) -> Result<Event, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let row: (i64, String, String, String, DateTime<Utc>, Option<DateTime<Utc>>) = sqlx::query_as(
            "SELECT id, source, source_id, event_type, created_at, reconciled_at FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| crate::error::classify_sqlx_error("Event", &id.to_string(), e))?;
        Ok(Event {
            id: row.0,
            source: row.1,
            source_id: row.2,
            event_type: row.3.parse().map_err(|_| SvcError::general_error("corrupt event_type in store"))?,
            created_at: row.4,
            reconciled_at: row.5,
        })
    }

    async fn unreconciled_since(
        &self,
        ctx: &RequestContext,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let rows: Vec<(i64, String, String, String, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT id, source, source_id, event_type, created_at, reconciled_at
            FROM events
            WHERE reconciled_at IS NULL OR reconciled_at < $1
            ORDER BY id ASC
            "#,
        )
        .bind(since)
        .fetch_all(&mut **conn)
        .await
        .map_err(|e| crate::error::classify_sqlx_error("Event", "unreconciled", e))?;
        rows.into_iter()
            .map(|row| {
                Ok(Event {
                    id: row.0,
                    source: row.1,
                    source_id: row.2,
                    event_type: row
                        .3
                        .parse()
                        .map_err(|_| SvcError::general_error("corrupt event_type in store"))?,
                    created_at: row.4,
                    reconciled_at: row.5,
                })
            })
            .collect()
    }

    async fn mark_reconciled(
        &self,
        ctx: &RequestContext,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        sqlx::query("UPDATE events SET reconciled_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(|e| crate::error::classify_sqlx_error("Event", &id.to_string(), e))?;
        Ok(())
    }
}
