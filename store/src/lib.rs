//! Postgres-backed persistence: transaction scoping (§4.2), advisory locks
//! (§4.3), the append-only event log (§4.4), and the generic per-kind DAO
//! contract (§4.5).

pub mod dao;
pub mod error;
pub mod event;
pub mod lock;
pub mod txn;

pub use error::StoreError;
pub use event::{Event, EventStore, EventType, PgEventStore};
pub use lock::{AdvisoryLockOwner, AdvisoryLockService, PgAdvisoryLockService};
pub use txn::Transaction;

use snafu::ResultExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Owns the connection pool every request's [`Transaction`] is opened from.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context(error::Connect)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the schema migrations embedded at the workspace-level
    /// `migrations/` directory (spec §4.9: an ordered list of schema steps,
    /// assembled from every registered kind's plugin).
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query {
                source: sqlx::Error::Migrate(Box::new(e)),
            })
    }
}
