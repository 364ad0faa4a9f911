//! Store-native failures and their classification into the shared taxonomy (spec §7).

use common_lib::SvcError;
use snafu::Snafu;

/// Failures raised by the store layer itself, before classification.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Failed to acquire a connection from the pool: {}", source))]
    Connect { source: sqlx::Error },
    #[snafu(display("Query failed: {}", source))]
    Query { source: sqlx::Error },
    #[snafu(display("Failed to begin transaction: {}", source))]
    BeginTxn { source: sqlx::Error },
    #[snafu(display("Failed to commit transaction: {}", source))]
    Commit { source: sqlx::Error },
    #[snafu(display("Failed to roll back transaction: {}", source))]
    Rollback { source: sqlx::Error },
    #[snafu(display("No transaction is open on this request context"))]
    NoOpenTransaction,
    #[snafu(display("Transaction already resolved"))]
    AlreadyResolved,
    #[snafu(display("Advisory lock '{}' is held by another session", key))]
    LockConflict { key: String },
}

/// Classifies a raw `sqlx::Error` into the shared taxonomy (spec §7):
/// "record not found" -> NotFound, unique-violation -> AlreadyExists,
/// deadlock/serialization failure -> retriable Conflict, everything else -> GeneralError.
pub fn classify_sqlx_error(
    resource_kind: &str,
    resource_id: &str,
    err: sqlx::Error,
) -> SvcError {
    if matches!(err, sqlx::Error::RowNotFound) {
        return SvcError::not_found(resource_kind, resource_id);
    }
    if let sqlx::Error::Database(ref db_err) = err {
        if let Some(code) = db_err.code() {
            match code.as_ref() {
                // unique_violation
                "23505" => {
                    return SvcError::AlreadyExists {
                        reason: format!("{} '{}' already exists", resource_kind, resource_id),
                        resource_kind: Some(resource_kind.to_string()),
                        resource_id: Some(resource_id.to_string()),
                    };
                }
                // deadlock_detected, serialization_failure
                "40P01" | "40001" => {
                    return SvcError::Conflict {
                        reason: "concurrent write conflict, retry".to_string(),
                        resource_kind: Some(resource_kind.to_string()),
                        resource_id: Some(resource_id.to_string()),
                    };
                }
                _ => {}
            }
        }
    }
    SvcError::GeneralError {
        reason: err.to_string(),
        resource_kind: Some(resource_kind.to_string()),
        resource_id: Some(resource_id.to_string()),
        source: Some(Box::new(err)),
    }
}

impl From<StoreError> for SvcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockConflict { key } => SvcError::conflict(format!(
                "row locked: advisory lock '{}' held by another session",
                key
            )),
            StoreError::NoOpenTransaction | StoreError::AlreadyResolved => {
                SvcError::general_error(err.to_string())
            }
            StoreError::Connect { .. } => SvcError::Unavailable {
                reason: err.to_string(),
                resource_kind: None,
                resource_id: None,
                source: Some(Box::new(err)),
            },
            StoreError::Query { .. } | StoreError::BeginTxn { .. } | StoreError::Commit { .. } | StoreError::Rollback { .. } => {
                SvcError::GeneralError {
                    reason: err.to_string(),
                    resource_kind: None,
                    resource_id: None,
                    source: Some(Box::new(err)),
                }
            }
        }
    }
}
