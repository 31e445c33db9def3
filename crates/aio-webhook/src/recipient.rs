//! Recipient check: is this event addressed to us?

use serde_json::Value;

use crate::error::{WebhookError, WebhookResult};

/// Top-level payload field naming the intended recipient (the API key).
pub const RECIPIENT_CLIENT_ID: &str = "recipient_client_id";

/// Check that the payload's `recipient_client_id` equals `expected_api_key`.
///
/// A payload that is not JSON is an error. A missing or non-string field is a
/// plain mismatch.
pub fn matches_recipient(payload: &str, expected_api_key: &str) -> WebhookResult<bool> {
    let json: Value = serde_json::from_str(payload).map_err(|e| WebhookError::MalformedPayload {
        message: format!("error parsing the event payload during recipient check: {}", e),
    })?;

    Ok(json
        .get(RECIPIENT_CLIENT_ID)
        .and_then(Value::as_str)
        .is_some_and(|recipient| recipient == expected_api_key))
}
