//! Bearer-token verification (spec §4.10 step 5): extract the token,
//! verify it against the JWK provider, pull the username claim, attach it
//! to the request context. Exempt for health and reflection endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use common_lib::context::RequestContext;
use common_lib::SvcError;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::Value;

use crate::jwk::JwkKeyProvider;

/// Whether JWT auth is enforced, and if so, against which key provider.
#[derive(Clone)]
pub enum AuthConfig {
    Disabled,
    Enabled(Arc<JwkKeyProvider>),
}

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
];

fn unauthorized(reason: impl Into<String>) -> SvcError {
    SvcError::Unauthorized {
        reason: reason.into(),
        resource_kind: None,
        resource_id: None,
    }
}

/// Verifies `bearer_token` and attaches the resolved username to `ctx`.
/// A no-op when auth is disabled.
pub async fn authenticate(config: &AuthConfig, bearer_token: Option<&str>, ctx: &RequestContext) -> Result<(), SvcError> {
    let provider = match config {
        AuthConfig::Disabled => return Ok(()),
        AuthConfig::Enabled(provider) => provider,
    };

    let token = bearer_token.ok_or_else(|| unauthorized("missing bearer token"))?;

    let header = decode_header(token).map_err(|e| unauthorized(format!("malformed token header: {}", e)))?;
    if !RSA_ALGORITHMS.contains(&header.alg) {
        return Err(unauthorized(format!("unsupported signing algorithm: {:?}", header.alg)));
    }
    let kid = header.kid.ok_or_else(|| unauthorized("token header missing kid"))?;

    let key = provider
        .key_for(&kid)
        .await
        .map_err(|e| unauthorized(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.validate_aud = false;

    let data = decode::<HashMap<String, Value>>(token, &key, &validation)
        .map_err(|e| unauthorized(format!("token verification failed: {}", e)))?;

    let username = data
        .claims
        .get("username")
        .or_else(|| data.claims.get("preferred_username"))
        .and_then(Value::as_str)
        .ok_or_else(|| unauthorized("token missing username/preferred_username claim"))?;

    ctx.set_username(username);
    Ok(())
}

/// Extracts the bearer token from a `Bearer <token>` authorization header value.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("Basic xyz"), None);
    }

    #[tokio::test]
    async fn disabled_auth_is_a_no_op() {
        let ctx = RequestContext::new("op-1");
        authenticate(&AuthConfig::Disabled, None, &ctx).await.unwrap();
        assert!(ctx.username().is_none());
    }

    #[tokio::test]
    async fn enabled_auth_rejects_missing_token() {
        let provider = Arc::new(JwkKeyProvider::new(None, None));
        let ctx = RequestContext::new("op-2");
        let err = authenticate(&AuthConfig::Enabled(provider), None, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), common_lib::ErrorKind::Unauthorized);
    }
}
