//! # Ledger Module
//!
//! Read-only model of the base ledger the asset layer sits on.
//!
//! ## Architecture
//!
//! ```text
//! reference.rs   — Txid, ChainPosition, LedgerReference (the seal)
//! transaction.rs — Transaction: txid + ordered destination -> amount outputs
//! block.rs       — Block: height + ordered transactions
//! chain.rs       — ChainIndex (sparse height -> Block) and SharedChainIndex
//! error.rs       — LedgerError
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Transaction → Block → ChainIndex
//!      ↓                   ↓
//! LedgerReference    range / address / txid queries
//! ```
//!
//! Constructing a transaction, block, or index is the only way data enters
//! this model; ingestion from a real node is somebody else's problem.

pub mod block;
pub mod chain;
pub mod error;
pub mod reference;
pub mod transaction;

pub use block::Block;
pub use chain::{ChainIndex, SharedChainIndex};
pub use error::LedgerError;
pub use reference::{ChainPosition, LedgerReference, Txid};
pub use transaction::{Transaction, TxOutput};
