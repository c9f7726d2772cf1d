//! # sealchain Contracts & Proofs
//!
//! Client-side validation for tokens anchored to a UTXO chain. Nothing here
//! writes to the base ledger; everything is checked by replaying proofs
//! against a read-only [`ChainIndex`](sealchain_protocol::ChainIndex).
//!
//! - **contract** — Plain and crowdsale contracts, and the token ids they
//!   derive.
//! - **crowdsale** — Greedy, chain-ordered allocation of a crowdsale's
//!   supply to buyers.
//! - **proof** — Transfer, issuance, and crowdsale-purchase proofs.
//! - **verifier** — Proof-graph verification with depth and cycle bounds,
//!   walked without recursion and checked in parallel.
//! - **codec** — bincode and JSON wire forms as a flat proof table, with an
//!   input-skipping mode.
//!
//! ## Design Principles
//!
//! 1. Amounts are summed in `u128`; no sum of `u64` outputs can wrap.
//! 2. Constructors enforce invariants. A value that exists is well formed.
//! 3. Verification failures are typed. `is_valid` is the only place a
//!    failure collapses into `false`.
//! 4. Proofs are trees of owned values. Verification only reads; spent
//!    state is restored explicitly with `Proof::mark_spent`.
//! 5. Verification and the codec walk proof trees with explicit work
//!    lists, so a deep proof costs heap, not stack.

pub mod codec;
pub mod contract;
pub mod crowdsale;
pub mod error;
pub mod proof;
pub mod verifier;

pub use codec::{
    decode_contract, decode_proof, decode_proof_with, encode_contract, encode_proof,
    DecodeOptions, EncodeOptions,
};
pub use contract::{Contract, CrowdsaleContract, PlainContract};
pub use crowdsale::{resolve_purchase, sale_ledger, settle, Purchase, PurchaseRecord, SaleLedger};
pub use error::{CodecError, ContractError, VerifyError};
pub use proof::{IssuanceProof, Proof, PurchaseProof, TransferProof};
pub use verifier::{VerificationReport, Verifier, VerifierConfig};
