use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::new_id;

/// Fields common to every persisted resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Meta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meta {
    /// Meta for a resource about to be created: generates an id if `id` is empty.
    pub fn new_created(id: impl Into<String>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            id: if id.is_empty() { new_id() } else { id },
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy with `updated_at` refreshed to now.
    pub fn touched(&self) -> Self {
        Self {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }
}
