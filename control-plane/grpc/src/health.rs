//! gRPC health service (spec §4.11: "Health & reflection... always
//! unauthenticated"). Thin re-export so the composition root doesn't need a
//! direct `tonic-health` dependency of its own.

pub use tonic_health::server::{health_reporter, HealthReporter};
pub use tonic_health::ServingStatus;
