use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aio-webhook",
    version,
    about = "Verify Adobe I/O Events webhook deliveries (recipient check + RSA-SHA256 signatures)"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Verify a captured webhook delivery
    Verify(VerifyArgs),
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Event payload file, exactly as received ("-" for stdin)
    #[arg(long, short = 'p')]
    pub payload: PathBuf,

    /// API key the event must be addressed to
    #[arg(long, env = "AIO_WEBHOOK_API_KEY")]
    pub api_key: String,

    /// Request header as NAME=VALUE or "NAME: VALUE" (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// JSON object of request headers; -H values take precedence
    #[arg(long)]
    pub headers_json: Option<PathBuf>,

    /// Override the public key security domain
    #[arg(long)]
    pub security_domain: Option<String>,

    /// Print a JSON report with per-slot outcomes
    #[arg(long)]
    pub report: bool,
}

/// Parse `NAME=VALUE` or `NAME: VALUE`. Names are kept verbatim.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let split = match (raw.find('='), raw.find(':')) {
        (Some(eq), Some(colon)) => raw.split_at(eq.min(colon)),
        (Some(i), None) | (None, Some(i)) => raw.split_at(i),
        (None, None) => return Err(format!("expected NAME=VALUE, got {:?}", raw)),
    };

    let name = split.0.trim();
    let value = split.1[1..].trim();
    if name.is_empty() {
        return Err(format!("empty header name in {:?}", raw));
    }

    Ok((name.to_string(), value.to_string()))
}
