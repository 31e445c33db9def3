//! Public key source for webhook signatures.
//!
//! Key paths arrive in request headers, so they are attacker-controlled: a
//! path is only ever resolved below the configured security domain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use rsa::RsaPublicKey;
use tracing::debug;
use url::Url;

use crate::config::VerifierConfig;
use crate::error::{WebhookError, WebhookResult};
use crate::signature::decode_public_key;

mod cache;
mod http;

use cache::KeyCache;
use http::HttpBackend;

const USER_AGENT_VALUE: &str = concat!("aio-webhook/", env!("CARGO_PKG_VERSION"));

/// Resolves a key path to an RSA public key.
#[async_trait]
pub trait PublicKeySource: Send + Sync {
    async fn fetch_public_key(&self, path: &str) -> WebhookResult<Arc<RsaPublicKey>>;
}

/// HTTP key source backed by the security domain, with an in-memory cache.
#[derive(Debug, Clone)]
pub struct PublicKeyClient {
    http: HttpBackend,
    security_domain: Url,
    cache: KeyCache,
}

impl PublicKeyClient {
    pub fn new(config: &VerifierConfig) -> WebhookResult<Self> {
        let security_domain = config.security_domain_url()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/x-pem-file, */*"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend {
                client,
                max_retries: config.max_retries,
                max_key_bytes: config.max_key_bytes,
            },
            security_domain,
            cache: KeyCache::new(
                config.cache_max_keys,
                Duration::from_secs(config.cache_ttl_secs),
            ),
        })
    }

    pub fn from_env() -> WebhookResult<Self> {
        Self::new(&VerifierConfig::from_env())
    }

    pub fn security_domain(&self) -> &Url {
        &self.security_domain
    }

    /// Resolve a key path to its absolute URL under the security domain.
    pub fn key_url(&self, path: &str) -> WebhookResult<Url> {
        resolve_key_url(&self.security_domain, path)
    }

    /// Drop a cached key so the next lookup fetches it again.
    pub async fn invalidate(&self, path: &str) {
        self.cache.invalidate(path).await;
    }

    /// Drop all cached keys.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    async fn download(&self, url: Url, path: &str) -> WebhookResult<Arc<RsaPublicKey>> {
        debug!(url = %url, "fetching public key");
        let pem = self.http.fetch_pem(&url, path).await?;
        Ok(Arc::new(decode_public_key(path, &pem)?))
    }
}

#[async_trait]
impl PublicKeySource for PublicKeyClient {
    async fn fetch_public_key(&self, path: &str) -> WebhookResult<Arc<RsaPublicKey>> {
        let url = self.key_url(path)?;

        if let Some(key) = self.cache.get(path).await {
            debug!(path = %path, "public key cache hit");
            return Ok(key);
        }

        self.cache.get_or_fetch(path, self.download(url, path)).await
    }
}

/// Join `path` onto `base`, refusing anything that leaves the base URL's
/// origin or path prefix.
pub(crate) fn resolve_key_url(base: &Url, path: &str) -> WebhookResult<Url> {
    let untrusted = |reason: &str| WebhookError::UntrustedKeyPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(untrusted("empty key path"));
    }
    if trimmed.contains("://") {
        return Err(untrusted("absolute URLs are not accepted"));
    }

    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        trimmed.trim_start_matches('/')
    );
    let url = Url::parse(&joined).map_err(|_| untrusted("not a valid URL path"))?;

    if url.scheme() != base.scheme()
        || url.host_str() != base.host_str()
        || url.port_or_known_default() != base.port_or_known_default()
    {
        return Err(untrusted("path escapes the security domain"));
    }

    let prefix = base.path().trim_end_matches('/');
    if !url.path().starts_with(&format!("{}/", prefix)) {
        return Err(untrusted("path escapes the security domain"));
    }

    Ok(url)
}
