//! Webhook request headers carrying the key paths and signatures.
//!
//! Adobe I/O Events sends two signatures with every delivery, one per signing
//! key, so consumers keep verifying while keys rotate.

use std::collections::HashMap;
use std::fmt;

/// Slot 1 public key path header.
pub const PUBLIC_KEY_1_PATH: &str = "x-adobe-public-key1-path";

/// Slot 2 public key path header.
pub const PUBLIC_KEY_2_PATH: &str = "x-adobe-public-key2-path";

/// Slot 1 signature header (base64).
pub const DIGITAL_SIGNATURE_1: &str = "x-adobe-digital-signature-1";

/// Slot 2 signature header (base64).
pub const DIGITAL_SIGNATURE_2: &str = "x-adobe-digital-signature-2";

/// One of the two (key path, signature) pairs of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureSlot {
    First,
    Second,
}

impl SignatureSlot {
    /// Both slots, in evaluation order.
    pub const ALL: [SignatureSlot; 2] = [SignatureSlot::First, SignatureSlot::Second];

    /// Header holding this slot's public key path.
    pub fn key_path_header(self) -> &'static str {
        match self {
            Self::First => PUBLIC_KEY_1_PATH,
            Self::Second => PUBLIC_KEY_2_PATH,
        }
    }

    /// Header holding this slot's signature.
    pub fn signature_header(self) -> &'static str {
        match self {
            Self::First => DIGITAL_SIGNATURE_1,
            Self::Second => DIGITAL_SIGNATURE_2,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

impl fmt::Display for SignatureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Key path and signature supplied for a single slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotHeaders {
    /// Public key path, relative to the security domain.
    pub key_path: Option<String>,

    /// Base64-encoded RSA-SHA256 signature of the payload.
    pub signature: Option<String>,
}

/// Signature-related headers of a webhook request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub first: SlotHeaders,
    pub second: SlotHeaders,
}

impl SignatureHeaders {
    /// Extract from a header map whose names are matched exactly.
    pub fn from_map(headers: &HashMap<String, String>) -> Self {
        let get = |name: &str| headers.get(name).cloned();
        Self {
            first: SlotHeaders {
                key_path: get(PUBLIC_KEY_1_PATH),
                signature: get(DIGITAL_SIGNATURE_1),
            },
            second: SlotHeaders {
                key_path: get(PUBLIC_KEY_2_PATH),
                signature: get(DIGITAL_SIGNATURE_2),
            },
        }
    }

    /// Extract from an HTTP header map (names are case-insensitive there).
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        Self {
            first: SlotHeaders {
                key_path: get(PUBLIC_KEY_1_PATH),
                signature: get(DIGITAL_SIGNATURE_1),
            },
            second: SlotHeaders {
                key_path: get(PUBLIC_KEY_2_PATH),
                signature: get(DIGITAL_SIGNATURE_2),
            },
        }
    }

    /// Headers for the given slot.
    pub fn slot(&self, slot: SignatureSlot) -> &SlotHeaders {
        match slot {
            SignatureSlot::First => &self.first,
            SignatureSlot::Second => &self.second,
        }
    }
}
