//! The shared request pipeline (spec §4.10): one ordered middleware chain —
//! Recover → OpID+Logging → Metrics → Transaction → Auth — applied
//! identically in front of the REST and gRPC frontends.

pub mod auth;
pub mod grpc;
pub mod jwk;
pub mod logging;
pub mod metrics;
pub mod recover;
pub mod rest;

pub use rest::{Pipeline, PipelineState};
