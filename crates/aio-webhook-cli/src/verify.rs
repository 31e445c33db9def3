use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use aio_webhook::{
    EventVerifier, SignatureHeaders, SignatureSlot, SlotOutcome, Verification, VerifierConfig,
    WebhookError,
};
use anyhow::{Context, Result};
use serde_json::json;

use crate::args::VerifyArgs;
use crate::exit_codes;

pub async fn run(args: VerifyArgs) -> Result<i32> {
    let payload = read_payload(&args.payload)?;
    let headers = collect_headers(args.headers_json.as_deref(), &args.headers)?;

    let mut config = VerifierConfig::from_env();
    if let Some(domain) = &args.security_domain {
        config = config.with_security_domain(domain.clone());
    }

    let verifier = match EventVerifier::new(&config) {
        Ok(v) => v,
        Err(e) => return Ok(report_error(&e)),
    };

    let signature_headers = SignatureHeaders::from_map(&headers);
    let verification = match verifier
        .evaluate(&payload, &args.api_key, &signature_headers)
        .await
    {
        Ok(v) => v,
        Err(e) => return Ok(report_error(&e)),
    };

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report_json(&verification))?);
    }

    match verification.into_result() {
        Ok(true) => {
            tracing::info!("event verified");
            Ok(exit_codes::VERIFIED)
        }
        Ok(false) => {
            eprintln!("rejected: event is not authentic for this API key");
            Ok(exit_codes::REJECTED)
        }
        Err(e) => Ok(report_error(&e)),
    }
}

fn report_error(err: &WebhookError) -> i32 {
    eprintln!("error: {}", err);
    exit_code_for(err)
}

fn exit_code_for(err: &WebhookError) -> i32 {
    if err.is_malformed_input() {
        exit_codes::INPUT_ERROR
    } else if err.is_key_resolution() {
        exit_codes::KEY_RESOLUTION_ERROR
    } else {
        exit_codes::CONFIG_ERROR
    }
}

fn read_payload(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut payload = String::new();
        std::io::stdin()
            .read_to_string(&mut payload)
            .context("failed to read payload from stdin")?;
        return Ok(payload);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload file {}", path.display()))
}

/// Merge headers from a JSON file with `-H` flags (flags win).
fn collect_headers(
    json_file: Option<&Path>,
    flags: &[(String, String)],
) -> Result<HashMap<String, String>> {
    let mut headers = HashMap::new();

    if let Some(path) = json_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read headers file {}", path.display()))?;
        let parsed: HashMap<String, String> = serde_json::from_str(&text).with_context(|| {
            format!(
                "headers file {} must be a JSON object of strings",
                path.display()
            )
        })?;
        headers.extend(parsed);
    }

    headers.extend(flags.iter().cloned());
    Ok(headers)
}

fn outcome_label(outcome: Option<&SlotOutcome>) -> serde_json::Value {
    match outcome {
        None => json!({ "status": "skipped" }),
        Some(SlotOutcome::Valid) => json!({ "status": "valid" }),
        Some(SlotOutcome::Invalid) => json!({ "status": "invalid" }),
        Some(SlotOutcome::Missing) => json!({ "status": "missing" }),
        Some(SlotOutcome::Unresolved(e)) => json!({
            "status": "unresolved",
            "error": e.to_string(),
        }),
    }
}

fn report_json(verification: &Verification) -> serde_json::Value {
    let slots: serde_json::Map<String, serde_json::Value> = SignatureSlot::ALL
        .iter()
        .map(|slot| (slot.to_string(), outcome_label(verification.slot(*slot))))
        .collect();

    json!({
        "verified": verification.is_verified(),
        "recipient_matched": verification.recipient_matched,
        "slots": slots,
    })
}
