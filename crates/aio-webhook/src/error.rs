//! Error types for webhook verification.
//!
//! Negative verification outcomes (wrong recipient, bad signature, missing
//! field) are not errors; they surface as `Ok(false)`. Everything here is
//! either malformed input or an infrastructure problem.

use crate::headers::SignatureSlot;

/// Webhook verification errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WebhookError {
    /// The event payload is not a JSON document.
    #[error("malformed event payload: {message}")]
    MalformedPayload { message: String },

    /// A signature header is not valid base64.
    #[error("malformed signature in slot {slot}: {reason}")]
    MalformedSignature { slot: SignatureSlot, reason: String },

    /// Network error while fetching a public key.
    #[error("network error: {message}")]
    Network { message: String },

    /// The security domain answered a key request with a non-2xx status.
    #[error("public key fetch failed for {path}: HTTP {status}")]
    KeyFetch { path: String, status: u16 },

    /// The key body could not be parsed as an RSA public key.
    #[error("invalid public key at {path}: {reason}")]
    InvalidPublicKey { path: String, reason: String },

    /// The key path would resolve outside the security domain.
    #[error("untrusted public key path {path}: {reason}")]
    UntrustedKeyPath { path: String, reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl WebhookError {
    /// Whether the error happened while resolving a public key.
    ///
    /// Key-resolution failures only disqualify the slot they occurred in.
    pub fn is_key_resolution(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::KeyFetch { .. }
                | Self::InvalidPublicKey { .. }
                | Self::UntrustedKeyPath { .. }
        )
    }

    /// Whether the error was caused by the webhook request itself.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. } | Self::MalformedSignature { .. }
        )
    }

    /// Whether the error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::KeyFetch { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for webhook verification.
pub type WebhookResult<T> = Result<T, WebhookError>;
