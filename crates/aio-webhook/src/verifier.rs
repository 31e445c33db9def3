//! Event payload verification.
//!
//! A delivery is authentic when it is addressed to our API key and at least
//! one of its two signatures verifies under the public key named next to it.
//! See <https://developer.adobe.com/events/docs/guides/#security-considerations>.
//!
//! # Verification Steps
//!
//! 1. Recipient check against `recipient_client_id`. A mismatch returns
//!    `false` before any key is fetched.
//! 2. Slot 1 and slot 2 are evaluated concurrently and independently: decode
//!    the signature, fetch the key, verify RSA-SHA256 over the raw payload.
//! 3. The delivery is accepted if either slot is valid.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::VerifierConfig;
use crate::error::{WebhookError, WebhookResult};
use crate::headers::{SignatureHeaders, SignatureSlot};
use crate::keys::{PublicKeyClient, PublicKeySource};
use crate::recipient::matches_recipient;
use crate::signature::{decode_signature, verify_signature_bytes};

/// A webhook delivery to verify.
#[derive(Debug, Clone, Default)]
pub struct VerificationRequest {
    /// Raw event body, exactly as received.
    pub payload: String,

    /// Our API key; the event's `recipient_client_id` must equal it.
    pub expected_recipient_id: String,

    /// Request headers, names matched case-sensitively.
    pub headers: HashMap<String, String>,
}

impl VerificationRequest {
    pub fn new(
        payload: impl Into<String>,
        expected_recipient_id: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            payload: payload.into(),
            expected_recipient_id: expected_recipient_id.into(),
            headers,
        }
    }
}

/// Result of evaluating one signature slot.
#[derive(Debug, Clone)]
pub enum SlotOutcome {
    /// The signature verifies under the slot's key.
    Valid,

    /// The key resolved but the signature does not match.
    Invalid,

    /// The slot's key path or signature header is absent.
    Missing,

    /// The slot could not be evaluated.
    Unresolved(WebhookError),
}

impl SlotOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The malformed-input error carried by this outcome, if any.
    fn malformed_input(&self) -> Option<&WebhookError> {
        match self {
            Self::Unresolved(e) if e.is_malformed_input() => Some(e),
            _ => None,
        }
    }
}

/// Detailed verification report.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Whether `recipient_client_id` matched the expected API key.
    pub recipient_matched: bool,

    /// Slot 1 outcome (`None` when signatures were not checked).
    pub first: Option<SlotOutcome>,

    /// Slot 2 outcome (`None` when signatures were not checked).
    pub second: Option<SlotOutcome>,
}

impl Verification {
    fn recipient_mismatch() -> Self {
        Self {
            recipient_matched: false,
            first: None,
            second: None,
        }
    }

    /// Outcome of the given slot.
    pub fn slot(&self, slot: SignatureSlot) -> Option<&SlotOutcome> {
        match slot {
            SignatureSlot::First => self.first.as_ref(),
            SignatureSlot::Second => self.second.as_ref(),
        }
    }

    /// True iff the recipient matched and at least one slot is valid.
    pub fn is_verified(&self) -> bool {
        self.recipient_matched
            && SignatureSlot::ALL
                .iter()
                .any(|slot| self.slot(*slot).is_some_and(SlotOutcome::is_valid))
    }

    /// Reduce to the boolean contract.
    ///
    /// A malformed signature is reported as an error unless the other slot
    /// verified. Key resolution failures only count as a failed slot.
    pub fn into_result(self) -> WebhookResult<bool> {
        if self.is_verified() {
            return Ok(true);
        }

        let malformed = SignatureSlot::ALL
            .iter()
            .find_map(|slot| self.slot(*slot).and_then(SlotOutcome::malformed_input));

        match malformed {
            Some(e) => Err(e.clone()),
            None => Ok(false),
        }
    }
}

/// Verifies Adobe I/O Events webhook deliveries.
#[derive(Clone)]
pub struct EventVerifier {
    keys: Arc<dyn PublicKeySource>,
}

impl EventVerifier {
    /// Verifier fetching keys from the configured security domain.
    pub fn new(config: &VerifierConfig) -> WebhookResult<Self> {
        Ok(Self::with_key_source(Arc::new(PublicKeyClient::new(config)?)))
    }

    pub fn from_env() -> WebhookResult<Self> {
        Self::new(&VerifierConfig::from_env())
    }

    /// Verifier using a custom key source.
    pub fn with_key_source(keys: Arc<dyn PublicKeySource>) -> Self {
        Self { keys }
    }

    /// Verify a delivery.
    ///
    /// # Arguments
    ///
    /// * `payload` - The raw event body
    /// * `api_key` - The event's `recipient_client_id` must equal it
    /// * `headers` - Request headers carrying both key paths and signatures
    ///
    /// # Returns
    ///
    /// `Ok(true)` if authentic, `Ok(false)` if not, `Err` on a malformed
    /// payload or a malformed signature that no valid sibling outweighs.
    pub async fn verify(
        &self,
        payload: &str,
        api_key: &str,
        headers: &HashMap<String, String>,
    ) -> WebhookResult<bool> {
        let headers = SignatureHeaders::from_map(headers);
        self.evaluate(payload, api_key, &headers).await?.into_result()
    }

    /// Verify a [`VerificationRequest`].
    pub async fn verify_request(&self, request: &VerificationRequest) -> WebhookResult<bool> {
        self.verify(
            &request.payload,
            &request.expected_recipient_id,
            &request.headers,
        )
        .await
    }

    /// Run every check and report per-slot outcomes.
    ///
    /// Only a malformed payload is returned as `Err`; everything else is in
    /// the report.
    pub async fn evaluate(
        &self,
        payload: &str,
        api_key: &str,
        headers: &SignatureHeaders,
    ) -> WebhookResult<Verification> {
        if !matches_recipient(payload, api_key)? {
            warn!(
                payload_len = payload.len(),
                "event recipient_client_id does not match the configured API key"
            );
            return Ok(Verification::recipient_mismatch());
        }

        let (first, second) = tokio::join!(
            self.evaluate_slot(payload, headers, SignatureSlot::First),
            self.evaluate_slot(payload, headers, SignatureSlot::Second),
        );

        let verification = Verification {
            recipient_matched: true,
            first: Some(first),
            second: Some(second),
        };

        if verification.is_verified() {
            debug!(payload_len = payload.len(), "event payload verified");
        } else {
            warn!(
                payload_len = payload.len(),
                "invalid signatures for the event payload"
            );
        }

        Ok(verification)
    }

    async fn evaluate_slot(
        &self,
        payload: &str,
        headers: &SignatureHeaders,
        slot: SignatureSlot,
    ) -> SlotOutcome {
        let slot_headers = headers.slot(slot);
        let Some(signature_b64) = &slot_headers.signature else {
            debug!(slot = %slot, "signature header not provided");
            return SlotOutcome::Missing;
        };

        // A bad signature header is reported even when its key path is absent.
        let signature = match decode_signature(signature_b64, slot) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(slot = %slot, error = %e, "malformed signature header");
                return SlotOutcome::Unresolved(e);
            }
        };

        let Some(key_path) = &slot_headers.key_path else {
            debug!(slot = %slot, "public key path header not provided");
            return SlotOutcome::Missing;
        };

        let key = match self.keys.fetch_public_key(key_path).await {
            Ok(key) => key,
            Err(e) => {
                warn!(slot = %slot, key_path = %key_path, error = %e, "failed to resolve public key");
                return SlotOutcome::Unresolved(e);
            }
        };

        if verify_signature_bytes(payload.as_bytes(), &signature, &key) {
            SlotOutcome::Valid
        } else {
            debug!(slot = %slot, key_path = %key_path, "signature does not match");
            SlotOutcome::Invalid
        }
    }
}

impl std::fmt::Debug for EventVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{
        DIGITAL_SIGNATURE_1, DIGITAL_SIGNATURE_2, PUBLIC_KEY_1_PATH, PUBLIC_KEY_2_PATH,
    };
    use crate::testutil::{sign_b64, test_key};
    use async_trait::async_trait;
    use rsa::RsaPublicKey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const API_KEY: &str = "my-api-key";
    const KEY_1: &str = "/prod/keys/pub-key-1.pem";
    const KEY_2: &str = "/prod/keys/pub-key-2.pem";

    /// In-memory key source that counts lookups.
    #[derive(Default)]
    struct StubKeys {
        keys: HashMap<String, RsaPublicKey>,
        calls: AtomicUsize,
    }

    impl StubKeys {
        fn with(mut self, path: &str, key: RsaPublicKey) -> Self {
            self.keys.insert(path.to_string(), key);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PublicKeySource for StubKeys {
        async fn fetch_public_key(&self, path: &str) -> WebhookResult<Arc<RsaPublicKey>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.keys
                .get(path)
                .cloned()
                .map(Arc::new)
                .ok_or_else(|| WebhookError::KeyFetch {
                    path: path.to_string(),
                    status: 404,
                })
        }
    }

    fn rotation_keys() -> Arc<StubKeys> {
        Arc::new(
            StubKeys::default()
                .with(KEY_1, test_key(0).to_public_key())
                .with(KEY_2, test_key(1).to_public_key()),
        )
    }

    fn payload(recipient: &str) -> String {
        format!(
            r#"{{"event_id":"6f1f9c6b","recipient_client_id":"{}","event":{{"hello":"world"}}}}"#,
            recipient
        )
    }

    fn headers(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn signed_headers(payload: &str) -> HashMap<String, String> {
        headers(&[
            (PUBLIC_KEY_1_PATH, KEY_1),
            (PUBLIC_KEY_2_PATH, KEY_2),
            (DIGITAL_SIGNATURE_1, &sign_b64(test_key(0), payload)),
            (DIGITAL_SIGNATURE_2, &sign_b64(test_key(1), payload)),
        ])
    }

    #[tokio::test]
    async fn test_both_slots_valid() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = payload(API_KEY);

        let verified = verifier
            .verify(&payload, API_KEY, &signed_headers(&payload))
            .await
            .unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn test_recipient_mismatch_skips_key_fetch() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = payload("someone-else");

        let verified = verifier
            .verify(&payload, API_KEY, &signed_headers(&payload))
            .await
            .unwrap();
        assert!(!verified);
        assert_eq!(keys.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_recipient_skips_key_fetch() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = r#"{"event_id":"6f1f9c6b"}"#;

        let report = verifier
            .evaluate(payload, API_KEY, &SignatureHeaders::from_map(&signed_headers(payload)))
            .await
            .unwrap();
        assert!(!report.recipient_matched);
        assert!(report.first.is_none() && report.second.is_none());
        assert_eq!(keys.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_error_before_key_fetch() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = r#"{"recipient_client_id": "my-api-key""#;

        let result = verifier
            .verify(payload, API_KEY, &signed_headers(payload))
            .await;
        assert!(matches!(result, Err(WebhookError::MalformedPayload { .. })));
        assert_eq!(keys.calls(), 0);
    }

    #[tokio::test]
    async fn test_slot_one_alone_is_enough() {
        let verifier = EventVerifier::with_key_source(rotation_keys());
        let payload = payload(API_KEY);

        for slot_two in [
            vec![],
            vec![(PUBLIC_KEY_2_PATH, KEY_2), (DIGITAL_SIGNATURE_2, "garbage!!")],
            vec![(PUBLIC_KEY_2_PATH, "/prod/keys/unknown.pem"), (DIGITAL_SIGNATURE_2, "c2ln")],
        ] {
            let sig = sign_b64(test_key(0), &payload);
            let mut entries = vec![(PUBLIC_KEY_1_PATH, KEY_1), (DIGITAL_SIGNATURE_1, sig.as_str())];
            entries.extend(slot_two);

            let verified = verifier
                .verify(&payload, API_KEY, &headers(&entries))
                .await
                .unwrap();
            assert!(verified);
        }
    }

    #[tokio::test]
    async fn test_slot_two_alone_is_enough() {
        let verifier = EventVerifier::with_key_source(rotation_keys());
        let payload = payload(API_KEY);
        let sig_2 = sign_b64(test_key(1), &payload);
        let wrong_sig = sign_b64(test_key(1), "something else");

        for slot_one in [
            vec![],
            vec![(PUBLIC_KEY_1_PATH, "/prod/keys/unknown.pem"), (DIGITAL_SIGNATURE_1, sig_2.as_str())],
            vec![(PUBLIC_KEY_1_PATH, KEY_1), (DIGITAL_SIGNATURE_1, wrong_sig.as_str())],
        ] {
            let mut entries = vec![(PUBLIC_KEY_2_PATH, KEY_2), (DIGITAL_SIGNATURE_2, sig_2.as_str())];
            entries.extend(slot_one);

            let verified = verifier
                .verify(&payload, API_KEY, &headers(&entries))
                .await
                .unwrap();
            assert!(verified);
        }
    }

    #[tokio::test]
    async fn test_slot_two_uses_its_own_signature() {
        // Slot 1 carries a signature made with key 2; it must not be tried
        // against key 2.
        let verifier = EventVerifier::with_key_source(rotation_keys());
        let payload = payload(API_KEY);
        let sig_by_key_2 = sign_b64(test_key(1), &payload);

        let entries = [
            (PUBLIC_KEY_1_PATH, KEY_1),
            (DIGITAL_SIGNATURE_1, sig_by_key_2.as_str()),
            (PUBLIC_KEY_2_PATH, KEY_2),
            (DIGITAL_SIGNATURE_2, "c2lnbmF0dXJl"),
        ];
        let report = verifier
            .evaluate(&payload, API_KEY, &SignatureHeaders::from_map(&headers(&entries)))
            .await
            .unwrap();

        assert!(matches!(report.first, Some(SlotOutcome::Invalid)));
        assert!(matches!(report.second, Some(SlotOutcome::Invalid)));
        assert!(!report.is_verified());
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let verifier = EventVerifier::with_key_source(rotation_keys());
        let payload = payload(API_KEY);
        let headers = signed_headers(&payload);

        let tampered = payload.replace("world", "worle");
        let verified = verifier.verify(&tampered, API_KEY, &headers).await.unwrap();
        assert!(!verified);
    }

    #[tokio::test]
    async fn test_malformed_signature_is_error() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = payload(API_KEY);

        let entries = [(PUBLIC_KEY_1_PATH, KEY_1), (DIGITAL_SIGNATURE_1, "%%% not base64 %%%")];
        let result = verifier.verify(&payload, API_KEY, &headers(&entries)).await;

        match result {
            Err(WebhookError::MalformedSignature { slot, .. }) => {
                assert_eq!(slot, SignatureSlot::First)
            }
            other => panic!("expected MalformedSignature, got {other:?}"),
        }
        // Decoding fails before the key is looked up.
        assert_eq!(keys.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_signature_without_key_path_is_error() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = payload(API_KEY);

        let entries = [(DIGITAL_SIGNATURE_1, "%%% not base64 %%%")];
        let result = verifier.verify(&payload, API_KEY, &headers(&entries)).await;

        match result {
            Err(WebhookError::MalformedSignature { slot, .. }) => {
                assert_eq!(slot, SignatureSlot::First)
            }
            other => panic!("expected MalformedSignature, got {other:?}"),
        }
        assert_eq!(keys.calls(), 0);
    }

    #[tokio::test]
    async fn test_signature_without_key_path_is_missing() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = payload(API_KEY);
        let sig_2 = sign_b64(test_key(1), &payload);

        let entries = [(DIGITAL_SIGNATURE_2, sig_2.as_str())];
        let verification = verifier
            .evaluate(&payload, API_KEY, &SignatureHeaders::from_map(&headers(&entries)))
            .await
            .unwrap();

        assert!(matches!(verification.second, Some(SlotOutcome::Missing)));
        assert!(!verification.into_result().unwrap());
        assert_eq!(keys.calls(), 0);
    }

    #[tokio::test]
    async fn test_unpadded_signature_verifies() {
        use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
        use base64::Engine;

        let verifier = EventVerifier::with_key_source(rotation_keys());
        let payload = payload(API_KEY);
        let padded = sign_b64(test_key(0), &payload);
        let unpadded = STANDARD_NO_PAD.encode(STANDARD.decode(&padded).unwrap());

        let entries = [(PUBLIC_KEY_1_PATH, KEY_1), (DIGITAL_SIGNATURE_1, unpadded.as_str())];
        let verified = verifier
            .verify(&payload, API_KEY, &headers(&entries))
            .await
            .unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn test_malformed_signature_does_not_mask_valid_sibling() {
        let verifier = EventVerifier::with_key_source(rotation_keys());
        let payload = payload(API_KEY);
        let sig_2 = sign_b64(test_key(1), &payload);

        let entries = [
            (PUBLIC_KEY_1_PATH, KEY_1),
            (DIGITAL_SIGNATURE_1, "%%% not base64 %%%"),
            (PUBLIC_KEY_2_PATH, KEY_2),
            (DIGITAL_SIGNATURE_2, sig_2.as_str()),
        ];
        let verified = verifier
            .verify(&payload, API_KEY, &headers(&entries))
            .await
            .unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn test_unresolvable_keys_are_false_not_error() {
        let keys = Arc::new(StubKeys::default());
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = payload(API_KEY);

        let verified = verifier
            .verify(&payload, API_KEY, &signed_headers(&payload))
            .await
            .unwrap();
        assert!(!verified);
        assert_eq!(keys.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_signature_headers_is_false() {
        let keys = rotation_keys();
        let verifier = EventVerifier::with_key_source(keys.clone());
        let payload = payload(API_KEY);

        let report = verifier
            .evaluate(&payload, API_KEY, &SignatureHeaders::default())
            .await
            .unwrap();
        assert!(matches!(report.first, Some(SlotOutcome::Missing)));
        assert!(matches!(report.second, Some(SlotOutcome::Missing)));
        assert!(!report.into_result().unwrap());
        assert_eq!(keys.calls(), 0);
    }

    #[tokio::test]
    async fn test_verify_request_is_idempotent() {
        let verifier = EventVerifier::with_key_source(rotation_keys());
        let payload = payload(API_KEY);
        let request = VerificationRequest::new(payload.clone(), API_KEY, signed_headers(&payload));

        let first = verifier.verify_request(&request).await.unwrap();
        let second = verifier.verify_request(&request).await.unwrap();
        assert!(first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_into_result_prefers_valid_over_malformed() {
        let malformed = SlotOutcome::Unresolved(WebhookError::MalformedSignature {
            slot: SignatureSlot::Second,
            reason: "bad".to_string(),
        });
        let report = Verification {
            recipient_matched: true,
            first: Some(SlotOutcome::Valid),
            second: Some(malformed.clone()),
        };
        assert!(report.into_result().unwrap());

        let report = Verification {
            recipient_matched: true,
            first: Some(SlotOutcome::Unresolved(WebhookError::Network {
                message: "timeout".to_string(),
            })),
            second: Some(malformed),
        };
        assert!(matches!(
            report.into_result(),
            Err(WebhookError::MalformedSignature { .. })
        ));
    }
}
