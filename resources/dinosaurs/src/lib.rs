//! The `Dinosaurs` resource kind (spec §3, §9 "Polymorphism over kinds"):
//! domain model, Postgres DAO, and Resource Service. Registered into the
//! process by the `server` composition root, not by this crate itself.

pub mod dao;
pub mod service;

use chrono::{DateTime, Utc};
use common_lib::meta::Meta;
use common_lib::MAX_STRING_FIELD_LEN;
use common_lib::SvcError;
use serde::{Deserialize, Serialize};

/// The kind name used as `Event::source`, table name, and advisory lock type.
pub const KIND: &str = "Dinosaurs";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dinosaur {
    #[serde(flatten)]
    pub meta: Meta,
    pub species: String,
}

impl Dinosaur {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.meta.updated_at
    }
}

/// Fields a caller may patch; only present fields are applied (spec §6 PATCH).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DinosaurPatch {
    pub species: Option<String>,
}

impl DinosaurPatch {
    pub fn apply(self, mut target: Dinosaur) -> Dinosaur {
        if let Some(species) = self.species {
            target.species = species;
        }
        target
    }
}

/// Required-non-empty + max-length validation shared by both frontends
/// (spec §9 Open Question: enforce required-non-empty on every kind-required
/// field in both REST and gRPC, not just REST's empty-id validator).
pub fn validate_species(species: &str) -> Result<(), SvcError> {
    if species.trim().is_empty() {
        return Err(SvcError::validation("species must not be empty"));
    }
    if species.len() > MAX_STRING_FIELD_LEN {
        return Err(SvcError::validation(format!(
            "species must be at most {} characters",
            MAX_STRING_FIELD_LEN
        )));
    }
    Ok(())
}
