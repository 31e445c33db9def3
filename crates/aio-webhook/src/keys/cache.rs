//! In-memory public key cache keyed by key path.
//!
//! Concurrent lookups of the same missing path share a single fetch; lookups
//! of distinct paths never wait on each other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rsa::RsaPublicKey;

use crate::error::WebhookResult;

#[derive(Clone)]
pub(crate) struct KeyCache {
    keys: Cache<String, Arc<RsaPublicKey>>,
}

impl KeyCache {
    pub(crate) fn new(max_keys: u64, ttl: Duration) -> Self {
        Self {
            keys: Cache::builder()
                .max_capacity(max_keys)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub(crate) async fn get(&self, path: &str) -> Option<Arc<RsaPublicKey>> {
        self.keys.get(path).await
    }

    /// Return the cached key or run `fetch` to populate it.
    ///
    /// Failed fetches are not cached.
    pub(crate) async fn get_or_fetch<F>(&self, path: &str, fetch: F) -> WebhookResult<Arc<RsaPublicKey>>
    where
        F: Future<Output = WebhookResult<Arc<RsaPublicKey>>>,
    {
        self.keys
            .try_get_with(path.to_string(), fetch)
            .await
            .map_err(|e| (*e).clone())
    }

    pub(crate) async fn invalidate(&self, path: &str) {
        self.keys.invalidate(path).await;
    }

    pub(crate) fn invalidate_all(&self) {
        self.keys.invalidate_all();
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("entries", &self.keys.entry_count())
            .finish()
    }
}
