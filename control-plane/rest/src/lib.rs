//! The Dinosaur/Fossil REST frontend (spec §6): `actix-web` route handlers
//! bound to the Resource Services, wired behind [`pipeline::Pipeline`] by
//! the `server` composition root.

pub mod config;
pub mod dinosaurs;
pub mod error;
pub mod fossils;
pub mod health;
pub mod query;

pub use config::RestConfig;
pub use error::RestError;

/// Path prefix exempt from transaction scoping and auth (spec §4.10 step 4-5).
pub const HEALTH_PATH_PREFIX: &str = "/healthz";
