//! Exit codes for the `aio-webhook` CLI.
//! These codes are part of the public contract: scripts rely on them to tell
//! a rejected delivery apart from broken input or an infrastructure problem.

pub const VERIFIED: i32 = 0;
pub const REJECTED: i32 = 1; // Recipient or signatures did not match
pub const INPUT_ERROR: i32 = 2; // Malformed payload, signature or CLI input
pub const KEY_RESOLUTION_ERROR: i32 = 3; // Public key could not be fetched or parsed
pub const CONFIG_ERROR: i32 = 4;
