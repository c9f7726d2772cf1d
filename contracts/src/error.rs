//! Error types for contracts, proofs, and their wire encoding.
//!
//! Construction-time failures ([`ContractError`]) are final: no partially
//! valid contract or proof is ever returned. Verification failures
//! ([`VerifyError`]) carry the typed reason the proof was rejected; there is
//! no silent `false`.

use sealchain_protocol::asset::{render_totals, AssetOutput, TokenId, TokenTotals};
use sealchain_protocol::ledger::{LedgerError, LedgerReference, Txid};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Errors raised while building contracts and proofs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The contract terms violate an invariant (supply, window, price,
    /// issuance reference).
    #[error("invalid contract terms: {reason}")]
    InvalidTerms {
        /// Which invariant failed.
        reason: String,
    },

    /// A proof was asked to commit to a reference without a txid.
    #[error("cannot commit to {reference}: reference is not fully specified")]
    InvalidReference {
        /// The `txid:index` form of the offending reference.
        reference: String,
    },

    /// An issuance proof's commitment differs from the contract's issuance
    /// reference.
    #[error("issuance proof commits to {commitment} but the contract was issued on {issuance}")]
    IssuanceMismatch {
        /// The proof's commitment.
        commitment: String,
        /// The contract's issuance reference.
        issuance: String,
    },

    /// A serialized contract carries a type tag this version does not know.
    #[error("unknown contract type {0:?}")]
    UnknownContractType(String),

    /// An underlying ledger object was malformed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Why a proof failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The proof's seal has not been closed on the base ledger yet.
    #[error("proof committed to unspent reference {commitment}")]
    UnspentCommitment {
        /// The unspent commitment.
        commitment: LedgerReference,
    },

    /// An input proof failed; `source` says why.
    #[error("input proof committed to {child} is invalid")]
    InvalidInput {
        /// Commitment of the failing input proof.
        child: LedgerReference,
        /// The input's own failure.
        source: Box<VerifyError>,
    },

    /// Per-token totals differ. For transfers `expected` is what flowed in
    /// from the inputs; for crowdsale purchases it is the buyer's
    /// entitlement.
    #[error(
        "amount mismatch: expected {} but outputs allocate {}",
        render_totals(.expected),
        render_totals(.actual)
    )]
    AmountMismatch {
        /// Totals the outputs had to match.
        expected: TokenTotals,
        /// Totals the outputs actually allocate.
        actual: TokenTotals,
    },

    /// An issuance proof's commitment is not the contract's issuance
    /// reference.
    #[error("issuance proof on {commitment} does not match the contract issued on {issuance}")]
    IssuanceMismatch {
        /// The proof's commitment.
        commitment: LedgerReference,
        /// The contract's issuance reference.
        issuance: LedgerReference,
    },

    /// An issuance proof does not allocate exactly the total supply to the
    /// owner in a single output.
    #[error(
        "issuance must allocate exactly {total_supply} of token {} to {owner}; found {} output(s)",
        .token_id.short(),
        .actual.len()
    )]
    IssuanceOutputMismatch {
        /// The contract's token.
        token_id: TokenId,
        /// The contract's supply.
        total_supply: u64,
        /// The contract's owner reference.
        owner: LedgerReference,
        /// What the proof actually carries.
        actual: Vec<AssetOutput>,
    },

    /// The contract's issuance seal has not been closed, so the contract was
    /// never published.
    #[error("contract issued on {issuance} has no commitment on the base ledger")]
    UncommittedContract {
        /// The contract's issuance reference.
        issuance: LedgerReference,
    },

    /// A deposit to the crowdsale address does not have exactly two outputs.
    #[error("purchase transaction {txid} has {outputs} outputs, expected 2")]
    MalformedPurchase {
        /// The offending deposit.
        txid: Txid,
        /// How many outputs it has.
        outputs: usize,
    },

    /// The purchase transaction is not a deposit inside the sale window.
    #[error("purchase transaction for {commitment} not found in the sale window")]
    PurchaseNotFound {
        /// The purchase proof's commitment.
        commitment: LedgerReference,
    },

    /// The purchase bought no tokens and is owed no change.
    #[error("purchase on {commitment} is entitled to neither tokens nor change")]
    NoEntitlement {
        /// The purchase proof's commitment.
        commitment: LedgerReference,
    },

    /// A purchase output carries neither the sale token nor its change token.
    #[error("output {output} is neither the sale token nor its change token")]
    UnrecognizedOutput {
        /// The stray output.
        output: AssetOutput,
    },

    /// The buyer is owed tokens but the proof allocates none.
    #[error("purchase on {commitment} is owed tokens but carries no token output")]
    MissingTokenOutput {
        /// The purchase proof's commitment.
        commitment: LedgerReference,
    },

    /// The buyer is owed change but the proof allocates none.
    #[error("purchase on {commitment} is owed change but carries no change output")]
    MissingChangeOutput {
        /// The purchase proof's commitment.
        commitment: LedgerReference,
    },

    /// The purchase's recorded height lies outside the sale window.
    #[error(
        "purchase confirmed at height {height}, outside the sale window [{from_height}, {to_height}]"
    )]
    OutsideSaleWindow {
        /// Height recorded for the purchase.
        height: u64,
        /// First block of the sale.
        from_height: u64,
        /// Last block of the sale.
        to_height: u64,
    },

    /// The proof graph is deeper than the configured safety limit.
    #[error("proof graph deeper than the configured limit of {limit}")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// A commitment appears among its own ancestors.
    #[error("proof committed to {commitment} appears among its own ancestors")]
    CycleDetected {
        /// The repeated commitment.
        commitment: LedgerReference,
    },
}

impl VerifyError {
    /// Follows `InvalidInput` chains down to the failure that started them.
    pub fn root_cause(&self) -> &VerifyError {
        let mut current = self;
        while let VerifyError::InvalidInput { source, .. } = current {
            current = source;
        }
        current
    }
}

// ---------------------------------------------------------------------------
// Wire
// ---------------------------------------------------------------------------

/// Errors raised while encoding or decoding wire forms.
#[derive(Debug, Error)]
pub enum CodecError {
    /// bincode failed.
    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),

    /// serde_json failed.
    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload was written by an incompatible encoder.
    #[error("unsupported wire format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the envelope.
        found: u16,
        /// Version this build writes.
        expected: u16,
    },

    /// An issuance or purchase proof arrived with input proofs.
    #[error("{variant} proof on {commitment} must not carry input proofs")]
    UnexpectedInputs {
        /// Proof variant name.
        variant: &'static str,
        /// The proof's commitment.
        commitment: String,
    },

    /// A proof carried both an issuance and a purchase payload.
    #[error("proof carries both issuance and crowdsale payloads")]
    ConflictingPayload,

    /// The proof table nests deeper than the decoder accepts.
    #[error("proof nesting exceeds the decode limit of {limit}")]
    DepthExceeded {
        /// Configured maximum depth.
        limit: usize,
    },

    /// The proof table is not a tree rooted at its first node.
    #[error("malformed proof table: {reason}")]
    MalformedTable {
        /// What is wrong with the table.
        reason: String,
    },

    /// A payload embeds the wrong kind of contract.
    #[error("{variant} proof embeds a {found:?} contract")]
    PayloadMismatch {
        /// Proof variant name.
        variant: &'static str,
        /// Contract type tag that was found.
        found: String,
    },

    /// The decoded terms or proof failed construction.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// A decoded reference or output was malformed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
