//! Loads PEM certificate/key pairs into the REST and gRPC frontends' own
//! TLS types. Both frontends delegate the actual handshake to their
//! library's built-in TLS support; this module only reads and parses the
//! material handed to them.

use std::path::Path;

use rustls::{Certificate, PrivateKey};
use snafu::ResultExt;

use crate::error::{self, ServerError};

/// Builds an `actix-web`/`rustls` server config for the REST HTTPS listener.
pub fn load_rustls_config(cert_path: &Path, key_path: &Path) -> Result<rustls::ServerConfig, ServerError> {
    let cert_path_str = cert_path.display().to_string();
    let key_path_str = key_path.display().to_string();

    let cert_bytes = std::fs::read(cert_path).context(error::ReadTls { path: cert_path_str.clone() })?;
    let key_bytes = std::fs::read(key_path).context(error::ReadTls { path: key_path_str.clone() })?;

    let cert_chain = rustls_pemfile::certs(&mut cert_bytes.as_slice())
        .map_err(|_| ServerError::InvalidTls {
            path: cert_path_str.clone(),
            reason: "could not parse PEM certificate chain".to_string(),
        })?
        .into_iter()
        .map(Certificate)
        .collect::<Vec<_>>();

    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut key_bytes.as_slice()).map_err(|_| ServerError::InvalidTls {
        path: key_path_str.clone(),
        reason: "could not parse PEM PKCS8 private key".to_string(),
    })?;
    let key = keys.pop().ok_or_else(|| ServerError::InvalidTls {
        path: key_path_str.clone(),
        reason: "no private key found in file".to_string(),
    })?;

    rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(cert_chain, PrivateKey(key))
        .map_err(|source| ServerError::InvalidTls {
            path: cert_path_str,
            reason: source.to_string(),
        })
}

/// Builds a `tonic` TLS identity for the gRPC listener.
pub async fn load_tonic_identity(cert_path: &Path, key_path: &Path) -> Result<tonic::transport::Identity, ServerError> {
    let cert_path_str = cert_path.display().to_string();
    let key_path_str = key_path.display().to_string();
    let cert = tokio::fs::read(cert_path).await.context(error::ReadTls { path: cert_path_str })?;
    let key = tokio::fs::read(key_path).await.context(error::ReadTls { path: key_path_str })?;
    Ok(tonic::transport::Identity::from_pem(cert, key))
}
