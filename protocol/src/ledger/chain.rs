//! # Chain Index
//!
//! Sparse `height -> Block` index over the base ledger, plus a `txid ->
//! position` lookup. Heights may have gaps and nothing checks continuity or
//! proof of work: the index answers range and address queries, not "is this
//! the valid chain".
//!
//! Blocks own their transactions; everything else refers to them by key
//! (height, txid). There are no back-pointers from transactions to blocks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use super::block::Block;
use super::error::LedgerError;
use super::reference::{ChainPosition, Txid};
use super::transaction::Transaction;

/// In-memory index of registered blocks.
#[derive(Debug, Clone, Default)]
pub struct ChainIndex {
    blocks: BTreeMap<u64, Block>,
    locations: HashMap<Txid, ChainPosition>,
}

impl ChainIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from a set of blocks.
    ///
    /// # Errors
    ///
    /// Propagates the first [`insert_block`](Self::insert_block) failure.
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Result<Self, LedgerError> {
        let mut index = Self::new();
        for block in blocks {
            index.insert_block(block)?;
        }
        Ok(index)
    }

    /// Registers a block. A block already stored at the same height is
    /// replaced and returned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateTransaction`] if one of the block's
    /// transactions is already indexed at a different height. The index is
    /// left unchanged.
    pub fn insert_block(&mut self, block: Block) -> Result<Option<Block>, LedgerError> {
        let height = block.height();

        for tx in block.transactions() {
            if let Some(existing) = self.locations.get(tx.txid()) {
                if existing.height != height {
                    return Err(LedgerError::DuplicateTransaction {
                        txid: tx.txid().to_string(),
                        height: existing.height,
                    });
                }
            }
        }

        let replaced = self.blocks.remove(&height);
        if let Some(old) = &replaced {
            warn!(
                height,
                old_tx_count = old.tx_count(),
                new_tx_count = block.tx_count(),
                "replacing block already indexed at this height"
            );
            for tx in old.transactions() {
                self.locations.remove(tx.txid());
            }
        }

        for (position, tx) in block.transactions().iter().enumerate() {
            self.locations
                .insert(tx.txid().clone(), ChainPosition { height, position });
        }

        debug!(height, tx_count = block.tx_count(), "block indexed");
        self.blocks.insert(height, block);
        Ok(replaced)
    }

    /// Block at `height`, if registered.
    pub fn block(&self, height: u64) -> Option<&Block> {
        self.blocks.get(&height)
    }

    /// Registered blocks with `lo <= height <= hi`, in increasing height
    /// order. Missing heights are skipped; an inverted range is empty.
    pub fn get_range(&self, lo: u64, hi: u64) -> impl Iterator<Item = &Block> {
        let range = if lo <= hi {
            Some(self.blocks.range(lo..=hi))
        } else {
            None
        };
        range.into_iter().flatten().map(|(_, block)| block)
    }

    /// Every transaction paying `address` within `[lo, hi]`, in chain order
    /// (height, then position within the block).
    pub fn deposits<'a>(
        &'a self,
        lo: u64,
        hi: u64,
        address: &'a str,
    ) -> impl Iterator<Item = (ChainPosition, &'a Transaction)> + 'a {
        self.get_range(lo, hi)
            .flat_map(move |block| block.transactions_to(address))
    }

    /// Where a transaction was confirmed, if it is indexed.
    pub fn locate(&self, txid: &Txid) -> Option<ChainPosition> {
        self.locations.get(txid).copied()
    }

    /// Looks up a confirmed transaction by id.
    pub fn transaction(&self, txid: &Txid) -> Option<&Transaction> {
        let position = self.locate(txid)?;
        self.blocks
            .get(&position.height)
            .and_then(|block| block.transactions().get(position.position))
    }

    /// Highest registered height.
    pub fn tip_height(&self) -> Option<u64> {
        self.blocks.keys().next_back().copied()
    }

    /// Number of registered blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block has been registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SharedChainIndex
// ---------------------------------------------------------------------------

/// A chain index shared between one block-registration writer and any
/// number of verifying readers.
///
/// Verification never mutates the index, so readers hold the read lock for
/// the duration of a verification (or take a [`snapshot`](Self::snapshot)
/// when that would starve the writer).
#[derive(Debug, Clone, Default)]
pub struct SharedChainIndex {
    inner: Arc<RwLock<ChainIndex>>,
}

impl SharedChainIndex {
    /// Wraps an existing index.
    pub fn new(index: ChainIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Registers a block under the write lock.
    ///
    /// # Errors
    ///
    /// See [`ChainIndex::insert_block`].
    pub fn insert_block(&self, block: Block) -> Result<Option<Block>, LedgerError> {
        self.inner.write().insert_block(block)
    }

    /// Acquires the read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, ChainIndex> {
        self.inner.read()
    }

    /// Clones the current index so the caller can work without holding the
    /// lock.
    pub fn snapshot(&self) -> ChainIndex {
        self.inner.read().clone()
    }

    /// Highest registered height.
    pub fn tip_height(&self) -> Option<u64> {
        self.inner.read().tip_height()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
