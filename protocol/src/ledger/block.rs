//! # Block Structure
//!
//! A block here is only a height and an ordered transaction list. No hashes,
//! no parent links, no proof of work: the asset layer asks the base ledger
//! two questions ("which transactions in this height range pay address X?"
//! and "at what height was transaction T confirmed?") and nothing else.
//!
//! Building a block stamps every contained transaction with the block's
//! height. That stamp replaces a live back-pointer from transaction to block.

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::reference::{ChainPosition, Txid};
use super::transaction::Transaction;

/// A base-ledger block: height plus ordered transactions.
///
/// The order of `transactions` is load-bearing. It is the tie-break among
/// crowdsale buyers confirmed in the same block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    height: u64,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Builds a block and stamps each transaction with `height`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidBlock`] for height 0 or when the same
    /// txid appears twice.
    pub fn new(height: u64, mut transactions: Vec<Transaction>) -> Result<Self, LedgerError> {
        if height == 0 {
            return Err(LedgerError::InvalidBlock {
                height,
                reason: "height must be > 0".to_string(),
            });
        }

        for (i, tx) in transactions.iter().enumerate() {
            if transactions[..i].iter().any(|prev| prev.txid() == tx.txid()) {
                return Err(LedgerError::InvalidBlock {
                    height,
                    reason: format!("transaction {} included twice", tx.txid()),
                });
            }
        }

        for tx in &mut transactions {
            tx.set_block_height(height);
        }

        Ok(Self {
            height,
            transactions,
        })
    }

    /// Block height.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Transactions in stored order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Finds a transaction by id, returning its position in the block.
    pub fn transaction(&self, txid: &Txid) -> Option<(ChainPosition, &Transaction)> {
        self.transactions
            .iter()
            .enumerate()
            .find(|(_, tx)| tx.txid() == txid)
            .map(|(position, tx)| (self.position(position), tx))
    }

    /// Transactions with at least one output paying `address`, in stored
    /// order.
    pub fn transactions_to<'a>(
        &'a self,
        address: &'a str,
    ) -> impl Iterator<Item = (ChainPosition, &'a Transaction)> + 'a {
        self.transactions
            .iter()
            .enumerate()
            .filter(move |(_, tx)| tx.pays_to(address))
            .map(move |(position, tx)| (self.position(position), tx))
    }

    fn position(&self, position: usize) -> ChainPosition {
        ChainPosition {
            height: self.height,
            position,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
