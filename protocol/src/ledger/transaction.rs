//! Minimal read-only model of a base-ledger transaction.
//!
//! Only what the asset layer needs survives here: an id and an
//! insertion-ordered `destination -> amount` mapping. Output indices are
//! assigned by enumeration order of that mapping, exactly as the base
//! ledger would number them.

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::reference::{LedgerReference, Txid};

/// One `destination -> amount` entry of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Address paid by this output.
    pub destination: String,
    /// Amount in the smallest base-ledger unit.
    pub amount: u64,
}

/// A base-ledger transaction as seen by the asset layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    txid: Txid,
    outputs: Vec<TxOutput>,
    /// Height of the owning block, stamped when the transaction is placed
    /// in a [`Block`](super::Block).
    #[serde(default)]
    block_height: Option<u64>,
}

impl Transaction {
    /// Builds a transaction from its ordered output mapping.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransaction`] if the txid is empty, the
    /// mapping is empty, a destination is empty or repeated, or an amount is
    /// zero.
    pub fn new<I, D>(txid: impl Into<Txid>, outputs: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = (D, u64)>,
        D: Into<String>,
    {
        let txid = txid.into();
        let invalid = |reason: String| LedgerError::InvalidTransaction {
            txid: txid.to_string(),
            reason,
        };

        if txid.is_empty() {
            return Err(invalid("empty transaction id".to_string()));
        }

        let mut collected: Vec<TxOutput> = Vec::new();
        for (destination, amount) in outputs {
            let destination = destination.into();
            if destination.is_empty() {
                return Err(invalid(format!(
                    "output {} has an empty destination",
                    collected.len()
                )));
            }
            if amount == 0 {
                return Err(invalid(format!(
                    "output {} to {} carries a zero amount",
                    collected.len(),
                    destination
                )));
            }
            if collected.iter().any(|o| o.destination == destination) {
                return Err(invalid(format!("destination {} appears twice", destination)));
            }
            collected.push(TxOutput {
                destination,
                amount,
            });
        }

        if collected.is_empty() {
            return Err(invalid("transaction has no outputs".to_string()));
        }

        Ok(Self {
            txid,
            outputs: collected,
            block_height: None,
        })
    }

    /// Transaction id.
    pub fn txid(&self) -> &Txid {
        &self.txid
    }

    /// Ordered outputs.
    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    /// Number of outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Height of the owning block, if the transaction has been placed in one.
    pub fn block_height(&self) -> Option<u64> {
        self.block_height
    }

    pub(crate) fn set_block_height(&mut self, height: u64) {
        self.block_height = Some(height);
    }

    /// Returns a reference to output `index`, carrying the destination,
    /// amount, and owning block height.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidReference`] if `index` is out of range.
    pub fn output(&self, index: u32) -> Result<LedgerReference, LedgerError> {
        let out = self
            .outputs
            .get(index as usize)
            .ok_or_else(|| LedgerError::InvalidReference {
                reason: format!(
                    "output index {} out of range for {} ({} outputs)",
                    index,
                    self.txid,
                    self.outputs.len()
                ),
            })?;
        self.reference_for(index, out)
    }

    /// References to every output, in index order.
    pub fn references(&self) -> impl Iterator<Item = LedgerReference> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .filter_map(move |(i, out)| self.reference_for(i as u32, out).ok())
    }

    fn reference_for(&self, index: u32, out: &TxOutput) -> Result<LedgerReference, LedgerError> {
        Ok(LedgerReference::outpoint(self.txid.clone(), index)
            .with_destination(out.destination.clone())
            .with_amount(out.amount)?
            .at_height(self.block_height))
    }

    /// Total amount paid to `address` by this transaction.
    pub fn amount_to(&self, address: &str) -> u64 {
        self.outputs
            .iter()
            .filter(|o| o.destination == address)
            .map(|o| o.amount)
            .sum()
    }

    /// Whether any output pays `address`.
    pub fn pays_to(&self, address: &str) -> bool {
        self.outputs.iter().any(|o| o.destination == address)
    }
}
