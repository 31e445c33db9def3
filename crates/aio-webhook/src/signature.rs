//! RSA-SHA256 signature verification over raw payload bytes.
//!
//! Signatures are PKCS#1 v1.5 with SHA-256, base64-encoded by the sender. The
//! payload is verified exactly as received: no canonicalization, no trimming.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::sha2::Sha256;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;

use crate::error::{WebhookError, WebhookResult};
use crate::headers::SignatureSlot;

/// Standard alphabet; `=` padding is optional on decode.
const SIGNATURE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Verify a base64 signature of `payload` under `key`.
///
/// Returns `Ok(false)` when the signature does not match. Only a signature
/// that is not valid base64 is an error (`MalformedSignature` for `slot`).
pub fn verify_signature(
    payload: &[u8],
    signature_b64: &str,
    key: &RsaPublicKey,
    slot: SignatureSlot,
) -> WebhookResult<bool> {
    let signature_bytes = decode_signature(signature_b64, slot)?;
    Ok(verify_signature_bytes(payload, &signature_bytes, key))
}

/// Decode a base64 signature header value.
pub fn decode_signature(signature_b64: &str, slot: SignatureSlot) -> WebhookResult<Vec<u8>> {
    SIGNATURE_ENGINE
        .decode(signature_b64.trim())
        .map_err(|e| WebhookError::MalformedSignature {
            slot,
            reason: e.to_string(),
        })
}

/// Verify already-decoded signature bytes.
pub fn verify_signature_bytes(payload: &[u8], signature: &[u8], key: &RsaPublicKey) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };

    VerifyingKey::<Sha256>::new(key.clone())
        .verify(payload, &signature)
        .is_ok()
}

/// Decode a PEM RSA public key (SPKI or PKCS#1).
pub fn decode_public_key(path: &str, pem: &str) -> WebhookResult<RsaPublicKey> {
    let pem = pem.trim();

    if let Ok(key) = RsaPublicKey::from_public_key_pem(pem) {
        return Ok(key);
    }

    RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| WebhookError::InvalidPublicKey {
        path: path.to_string(),
        reason: format!("not an RSA public key PEM: {}", e),
    })
}
