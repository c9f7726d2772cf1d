//! # Protocol Configuration & Constants
//!
//! Every magic number in sealchain lives here. If you're hardcoding a constant
//! somewhere else, move it here first.
//!
//! Some of these values feed directly into token identity (the contract type
//! tags and the change-token domain). Changing them after the first issuance
//! changes every token id derived from then on, so treat them as frozen.

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

/// Version of the binary wire encoding for contracts and proofs.
/// Bumped whenever a field is added to or removed from the wire structs.
pub const WIRE_FORMAT_VERSION: u16 = 1;

/// Largest binary payload the codec will read or write. Bounds the memory a
/// hostile length prefix can make the decoder allocate.
pub const MAX_WIRE_PAYLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Contract type tag for plain (single-owner) issuance contracts.
pub const CONTRACT_TYPE_GENERIC: &str = "generic";

/// Contract type tag for timed crowdsale contracts.
pub const CONTRACT_TYPE_CROWDSALE: &str = "crowdsale";

// ---------------------------------------------------------------------------
// Token Identity
// ---------------------------------------------------------------------------

/// Domain tag prepended to a crowdsale contract's canonical bytes when
/// deriving its change token id. Keeps refund tokens in a namespace disjoint
/// from the primary token.
pub const CHANGE_TOKEN_DOMAIN: &[u8] = b"CHANGE";

/// Token id length in bytes (SHA-256 output).
pub const TOKEN_ID_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Crowdsale
// ---------------------------------------------------------------------------

/// Number of outputs a purchase transaction must carry: one payment to the
/// deposit address and one receipt output that receives the tokens.
pub const CROWDSALE_PURCHASE_OUTPUTS: usize = 2;

// ---------------------------------------------------------------------------
// Verification Limits
// ---------------------------------------------------------------------------

/// Default bound on proof-graph depth, applied both when decoding and when
/// verifying. Honest proof chains grow by one level per transfer, so this is
/// generous. Neither walk recurses, so the bound limits work, not stack use.
pub const DEFAULT_MAX_PROOF_DEPTH: usize = 1_024;

/// Default minimum number of proofs below the root before verification fans
/// out across the rayon thread pool. Below this the scheduling overhead
/// dominates.
pub const DEFAULT_PARALLEL_MIN_INPUTS: usize = 4;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Overrides the proof recursion bound.
pub const ENV_MAX_PROOF_DEPTH: &str = "SEALCHAIN_MAX_PROOF_DEPTH";

/// Enables (`1`/`true`) or disables (`0`/`false`) parallel input verification.
pub const ENV_PARALLEL_VERIFY: &str = "SEALCHAIN_PARALLEL_VERIFY";

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Parses a boolean environment flag. Accepts `1/0`, `true/false`, `yes/no`
/// and `on/off` (case-insensitive). Returns `None` for anything else so the
/// caller can decide on the fallback.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
