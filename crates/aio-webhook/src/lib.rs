//! Verification of Adobe I/O Events webhook deliveries.
//!
//! A delivery is trusted when:
//!
//! - its `recipient_client_id` equals the subscriber's API key, and
//! - at least one of the two RSA-SHA256 signatures it carries verifies under
//!   the public key named next to it (two keys so rotation never breaks
//!   verification).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use aio_webhook::{EventVerifier, VerifierConfig};
//!
//! # async fn example(payload: &str, headers: HashMap<String, String>) -> anyhow::Result<()> {
//! let verifier = EventVerifier::new(&VerifierConfig::default())?;
//!
//! if verifier.verify(payload, "my-api-key", &headers).await? {
//!     println!("authentic event");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `AIO_EVENTS_SECURITY_DOMAIN` | Public key base URL (default: `https://static.adobeioevents.com`) |
//! | `AIO_EVENTS_KEY_TIMEOUT` | Key fetch timeout in seconds (default: 10) |
//! | `AIO_EVENTS_KEY_MAX_RETRIES` | Max retries for transient failures (default: 2) |
//! | `AIO_EVENTS_KEY_CACHE_MAX` | Max cached public keys (default: 100) |
//! | `AIO_EVENTS_KEY_CACHE_TTL` | Cached key lifetime in seconds (default: 86400) |

pub mod config;
pub mod error;
pub mod headers;
pub mod keys;
pub mod recipient;
pub mod signature;
pub mod verifier;

#[cfg(test)]
mod testutil;

pub use config::{VerifierConfig, DEFAULT_SECURITY_DOMAIN};
pub use error::{WebhookError, WebhookResult};
pub use headers::{
    SignatureHeaders, SignatureSlot, SlotHeaders, DIGITAL_SIGNATURE_1, DIGITAL_SIGNATURE_2,
    PUBLIC_KEY_1_PATH, PUBLIC_KEY_2_PATH,
};
pub use keys::{PublicKeyClient, PublicKeySource};
pub use recipient::{matches_recipient, RECIPIENT_CLIENT_ID};
pub use signature::{decode_public_key, verify_signature};
pub use verifier::{EventVerifier, SlotOutcome, Verification, VerificationRequest};
