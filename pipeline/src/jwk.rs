//! JWK key provider (spec §4.11): caches RSA public keys by `kid`, reloading
//! from a configured file and/or URL no more often than `reload_min_wait`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::Deserialize;
use snafu::{ResultExt, Snafu};

/// Default minimum wait between reload attempts triggered by a cache miss.
pub const DEFAULT_RELOAD_MIN_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Snafu)]
pub enum JwkError {
    #[snafu(display("unknown kid '{}' and keys were recently reloaded", kid))]
    UnknownKidRecentlyReloaded { kid: String },
    #[snafu(display("unknown kid '{}' after key reload", kid))]
    UnknownKidAfterReload { kid: String },
    #[snafu(display("failed to read JWK file '{}': {}", path, source))]
    ReadFile { path: String, source: std::io::Error },
    #[snafu(display("failed to fetch JWK url '{}': {}", url, source))]
    FetchUrl { url: String, source: reqwest::Error },
    #[snafu(display("failed to parse JWK set: {}", source))]
    ParseSet { source: serde_json::Error },
}

#[derive(Debug, Deserialize)]
struct JwkKeyData {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSetData {
    keys: Vec<JwkKeyData>,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey<'static>>,
    last_reload: Option<Instant>,
}

/// Caches RSA public keys by `kid`, reloading from `keys_file` and/or
/// `keys_url` on a cache miss, at most once per `reload_min_wait`.
pub struct JwkKeyProvider {
    keys_file: Option<String>,
    keys_url: Option<String>,
    reload_min_wait: Duration,
    cache: RwLock<CachedKeys>,
}

impl JwkKeyProvider {
    pub fn new(keys_file: Option<String>, keys_url: Option<String>) -> Self {
        Self {
            keys_file,
            keys_url,
            reload_min_wait: DEFAULT_RELOAD_MIN_WAIT,
            cache: RwLock::new(CachedKeys {
                keys: HashMap::new(),
                last_reload: None,
            }),
        }
    }

    pub fn with_reload_min_wait(mut self, wait: Duration) -> Self {
        self.reload_min_wait = wait;
        self
    }

    /// Returns the cached key for `kid`, reloading at most once per
    /// `reload_min_wait` on a miss.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey<'static>, JwkError> {
        if let Some(key) = self.cache.read().keys.get(kid).cloned() {
            return Ok(key);
        }

        let recently_reloaded = self
            .cache
            .read()
            .last_reload
            .map(|t| t.elapsed() < self.reload_min_wait)
            .unwrap_or(false);
        if recently_reloaded {
            return Err(JwkError::UnknownKidRecentlyReloaded {
                kid: kid.to_string(),
            });
        }

        self.reload().await?;

        self.cache
            .read()
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| JwkError::UnknownKidAfterReload {
                kid: kid.to_string(),
            })
    }

    async fn reload(&self) -> Result<(), JwkError> {
        let mut parsed = HashMap::new();

        if let Some(path) = &self.keys_file {
            let data = tokio::fs::read(path)
                .await
                .context(ReadFile { path: path.clone() })?;
            parse_and_store(&data, &mut parsed)?;
        }
        if let Some(url) = &self.keys_url {
            let data = fetch_url(url).await.context(FetchUrl { url: url.clone() })?;
            parse_and_store(&data, &mut parsed)?;
        }

        let mut cache = self.cache.write();
        cache.last_reload = Some(Instant::now());
        cache.keys.extend(parsed);
        Ok(())
    }
}

async fn fetch_url(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

fn parse_and_store(
    data: &[u8],
    out: &mut HashMap<String, DecodingKey<'static>>,
) -> Result<(), JwkError> {
    let set: JwkSetData = serde_json::from_slice(data).context(ParseSet)?;
    for key in set.keys {
        if key.kty != "RSA" {
            continue;
        }
        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e);
        out.insert(key.kid.clone(), decoding_key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_jwk_set() -> Vec<u8> {
        br#"{"keys":[{"kid":"key-1","kty":"RSA","alg":"RS256","use":"sig","n":"AQAB","e":"AQAB"}]}"#
            .to_vec()
    }

    #[tokio::test]
    async fn loads_keys_from_file_and_caches() {
        let mut file = tempfile_touch();
        file.write_all(&sample_jwk_set()).unwrap();
        let path = file_path(&file);

        let provider = JwkKeyProvider::new(Some(path), None);
        let key = provider.key_for("key-1").await;
        assert!(key.is_ok());
    }

    #[tokio::test]
    async fn unknown_kid_recently_reloaded_short_circuits() {
        let mut file = tempfile_touch();
        file.write_all(&sample_jwk_set()).unwrap();
        let path = file_path(&file);

        let provider = JwkKeyProvider::new(Some(path), None)
            .with_reload_min_wait(Duration::from_secs(3600));
        let _ = provider.key_for("key-1").await;
        let err = provider.key_for("does-not-exist").await.unwrap_err();
        assert!(matches!(err, JwkError::UnknownKidRecentlyReloaded { .. }));
    }

    fn tempfile_touch() -> std::fs::File {
        let path = std::env::temp_dir().join(format!("jwk-test-{}.json", ulid::Ulid::new()));
        std::fs::File::create(path).unwrap()
    }

    fn file_path(file: &std::fs::File) -> String {
        // `File` doesn't expose its path; re-derive via /proc on Linux test runners.
        let fd = std::os::unix::io::AsRawFd::as_raw_fd(file);
        std::fs::read_link(format!("/proc/self/fd/{}", fd))
            .unwrap()
            .to_string_lossy()
            .to_string()
    }
}
