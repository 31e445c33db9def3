//! HTTP layer for key fetches: status mapping, body limits, retry.
//!
//! keys/mod.rs never looks at status codes.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::error::{WebhookError, WebhookResult};

/// HTTP backend for key requests (holds reqwest client and limits).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) max_retries: u32,
    pub(crate) max_key_bytes: usize,
}

impl HttpBackend {
    /// GET a PEM document, retrying transient failures.
    pub(crate) async fn fetch_pem(&self, url: &Url, path: &str) -> WebhookResult<String> {
        let mut retries = 0;

        loop {
            match self.fetch_once(url, path).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let backoff = backoff_for(retries);

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying public key fetch"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url, path: &str) -> WebhookResult<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            debug!(status = status.as_u16(), path = %path, "public key request rejected");
            return Err(WebhookError::KeyFetch {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Err(WebhookError::InvalidPublicKey {
                path: path.to_string(),
                reason: "empty response".to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_key_bytes as u64 {
                return Err(self.too_large(path, len));
            }
        }

        let body = response.bytes().await.map_err(|e| WebhookError::Network {
            message: format!("failed to read public key body: {}", e),
        })?;

        if body.len() > self.max_key_bytes {
            return Err(self.too_large(path, body.len() as u64));
        }

        String::from_utf8(body.to_vec()).map_err(|_| WebhookError::InvalidPublicKey {
            path: path.to_string(),
            reason: "response is not UTF-8".to_string(),
        })
    }

    fn too_large(&self, path: &str, len: u64) -> WebhookError {
        WebhookError::InvalidPublicKey {
            path: path.to_string(),
            reason: format!(
                "response too large: {} bytes (limit {})",
                len, self.max_key_bytes
            ),
        }
    }
}

/// Jittered exponential backoff: up to 200ms, 400ms, ... capped at 5s.
fn backoff_for(retry: u32) -> Duration {
    let base = Duration::from_millis(100u64 << retry.min(6)).min(Duration::from_secs(5));
    let jittered_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64);
    Duration::from_millis(jittered_ms.max(10))
}
