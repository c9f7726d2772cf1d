//! Error types for the base-ledger model.

use thiserror::Error;

/// Errors raised while building or mutating base-ledger objects.
///
/// Construction-time violations are final: no partially valid reference,
/// transaction, or block is ever handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A ledger reference is malformed (bad `txid:index` string, zero
    /// amount, output index out of range).
    #[error("invalid ledger reference: {reason}")]
    InvalidReference {
        /// What was wrong with it.
        reason: String,
    },

    /// `spend()` was called on a reference whose seal is already consumed.
    #[error("ledger reference {reference} has already been spent")]
    AlreadySpent {
        /// The `txid:index` form of the reference.
        reference: String,
    },

    /// A transaction violates the output-mapping invariants.
    #[error("invalid transaction {txid}: {reason}")]
    InvalidTransaction {
        /// Identifier of the offending transaction.
        txid: String,
        /// Which invariant failed.
        reason: String,
    },

    /// A block violates its structural invariants.
    #[error("invalid block at height {height}: {reason}")]
    InvalidBlock {
        /// The height the block claims.
        height: u64,
        /// Which invariant failed.
        reason: String,
    },

    /// A transaction id is already indexed at a different height.
    #[error("transaction {txid} is already indexed at height {height}")]
    DuplicateTransaction {
        /// The repeated transaction id.
        txid: String,
        /// Height where the first copy lives.
        height: u64,
    },

    /// An asset amount outside `(0, 2^64)`.
    #[error("invalid amount {amount}: must be > 0")]
    InvalidAmount {
        /// The rejected amount.
        amount: u64,
    },
}
