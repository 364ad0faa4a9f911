//! The `Fossils` resource kind (spec §3, §9 "Polymorphism over kinds"):
//! domain model, Postgres DAO, and Resource Service.

pub mod dao;
pub mod service;

use chrono::{DateTime, Utc};
use common_lib::meta::Meta;
use common_lib::MAX_STRING_FIELD_LEN;
use common_lib::SvcError;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "Fossils";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fossil {
    #[serde(flatten)]
    pub meta: Meta,
    pub discovery_location: String,
    pub estimated_age: Option<i32>,
    pub fossil_type: Option<String>,
    pub excavator_name: Option<String>,
}

impl Fossil {
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
pub struct FossilPatch {
    pub discovery_location: Option<String>,
    pub estimated_age: Option<i32>,
    pub fossil_type: Option<String>,
    pub excavator_name: Option<String>,
}

impl FossilPatch {
    pub fn apply(self, mut target: Fossil) -> Fossil {
        if let Some(discovery_location) = self.discovery_location {
            target.discovery_location = discovery_location;
        }
        if self.estimated_age.is_some() {
            target.estimated_age = self.estimated_age;
        }
        if self.fossil_type.is_some() {
            target.fossil_type = self.fossil_type;
        }
        if self.excavator_name.is_some() {
            target.excavator_name = self.excavator_name;
        }
        target
    }
}

/// Required-non-empty on the one required field; optional fields, when
/// present, are just length-checked (spec §9 Open Question, resolved for
/// both frontends).
pub fn validate_discovery_location(value: &str) -> Result<(), SvcError> {
    if value.trim().is_empty() {
        return Err(SvcError::validation("discovery_location must not be empty"));
    }
    validate_optional_len("discovery_location", value)
}

pub fn validate_optional_string_field(name: &str, value: Option<&str>) -> Result<(), SvcError> {
    match value {
        Some(value) => validate_optional_len(name, value),
        None => Ok(()),
    }
}

fn validate_optional_len(name: &str, value: &str) -> Result<(), SvcError> {
    if value.len() > MAX_STRING_FIELD_LEN {
        return Err(SvcError::validation(format!(
            "{} must be at most {} characters",
            name, MAX_STRING_FIELD_LEN
        )));
    }
    Ok(())
}
