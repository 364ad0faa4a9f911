//! Dinosaur/Fossil gRPC frontend (spec §4.11, §6): one service per kind with
//! `Get`/`Create`/`Update`/`Delete`/`List`/`Watch`, plus the always-
//! unauthenticated gRPC health service.

pub mod dinosaur_service;
pub mod fossil_service;
pub mod health;
pub mod watch;

pub mod common {
    tonic::include_proto!("common");
}

pub mod dinosaur {
    tonic::include_proto!("dinosaur");
}

pub mod fossil {
    tonic::include_proto!("fossil");
}

pub use dinosaur_service::DinosaurGrpcService;
pub use fossil_service::FossilGrpcService;

/// Encoded `FileDescriptorSet` for `dinosaur.proto`/`fossil.proto`, used to
/// serve gRPC server reflection (spec §6: "reflection... always
/// unauthenticated").
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("dinosaur_fossil_descriptor");
