//! Verifier configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{WebhookError, WebhookResult};

/// Production domain serving the Adobe I/O Events signing keys.
pub const DEFAULT_SECURITY_DOMAIN: &str = "https://static.adobeioevents.com";

/// Verifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Base URL the public key paths are resolved against.
    #[serde(default = "default_security_domain")]
    pub security_domain: String,

    /// Request timeout in seconds for key fetches.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient key fetch failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of public keys kept in memory.
    #[serde(default = "default_cache_max_keys")]
    pub cache_max_keys: u64,

    /// How long a fetched key is reused before it is fetched again.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Largest accepted public key response body.
    #[serde(default = "default_max_key_bytes")]
    pub max_key_bytes: usize,
}

fn default_security_domain() -> String {
    DEFAULT_SECURITY_DOMAIN.to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_cache_max_keys() -> u64 {
    100
}

fn default_cache_ttl() -> u64 {
    24 * 60 * 60
}

fn default_max_key_bytes() -> usize {
    64 * 1024
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            security_domain: default_security_domain(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            cache_max_keys: default_cache_max_keys(),
            cache_ttl_secs: default_cache_ttl(),
            max_key_bytes: default_max_key_bytes(),
        }
    }
}

impl VerifierConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `AIO_EVENTS_SECURITY_DOMAIN` | Base URL for public keys |
    /// | `AIO_EVENTS_KEY_TIMEOUT` | Key fetch timeout in seconds |
    /// | `AIO_EVENTS_KEY_MAX_RETRIES` | Retries for transient key fetch failures |
    /// | `AIO_EVENTS_KEY_CACHE_MAX` | Maximum cached keys |
    /// | `AIO_EVENTS_KEY_CACHE_TTL` | Cached key lifetime in seconds |
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok().and_then(|v| v.parse().ok())
        }

        Self {
            security_domain: std::env::var("AIO_EVENTS_SECURITY_DOMAIN")
                .unwrap_or_else(|_| default_security_domain()),
            timeout_secs: parsed("AIO_EVENTS_KEY_TIMEOUT").unwrap_or_else(default_timeout),
            max_retries: parsed("AIO_EVENTS_KEY_MAX_RETRIES").unwrap_or_else(default_max_retries),
            cache_max_keys: parsed("AIO_EVENTS_KEY_CACHE_MAX")
                .unwrap_or_else(default_cache_max_keys),
            cache_ttl_secs: parsed("AIO_EVENTS_KEY_CACHE_TTL").unwrap_or_else(default_cache_ttl),
            max_key_bytes: default_max_key_bytes(),
        }
    }

    /// Set the security domain (e.g. a stub server in tests).
    pub fn with_security_domain(mut self, url: impl Into<String>) -> Self {
        self.security_domain = url.into();
        self
    }

    /// Set the maximum retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the key fetch timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Parse and check the security domain.
    pub fn security_domain_url(&self) -> WebhookResult<Url> {
        let url = Url::parse(self.security_domain.trim_end_matches('/')).map_err(|e| {
            WebhookError::Config {
                message: format!("invalid security domain {:?}: {}", self.security_domain, e),
            }
        })?;

        if !matches!(url.scheme(), "https" | "http") || url.host().is_none() {
            return Err(WebhookError::Config {
                message: format!(
                    "security domain must be an absolute http(s) URL: {}",
                    self.security_domain
                ),
            });
        }

        if url.scheme() == "http" {
            tracing::warn!(domain = %url, "security domain is not HTTPS");
        }

        Ok(url)
    }
}
