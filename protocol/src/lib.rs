// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # sealchain Protocol — Core Library
//!
//! sealchain models tokens that live *off* a Bitcoin-style UTXO chain. The
//! chain only ever sees ordinary transactions; each token movement is
//! attested by a proof that commits to one specific output, and the holder
//! checks validity by replaying proofs back to the issuance.
//!
//! This crate holds the parts every other layer builds on:
//!
//! - **ledger** — Read-only base-ledger model: references (seals),
//!   transactions, blocks, and the chain index.
//! - **asset** — Token identifiers and asset outputs.
//! - **crypto** — SHA-256 helpers used for token identity.
//! - **config** — Protocol constants and environment variable names.
//! - **logging** — `tracing` subscriber setup.
//!
//! Contracts, proofs, and verification live in `sealchain-contracts`.

pub mod asset;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod logging;

pub use asset::{AssetOutput, TokenId, TokenTotals};
pub use ledger::{
    Block, ChainIndex, ChainPosition, LedgerError, LedgerReference, SharedChainIndex,
    Transaction, Txid,
};
