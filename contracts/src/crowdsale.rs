//! # Crowdsale Allocation
//!
//! Buyers pay base-ledger units to the sale's deposit address. Deposits are
//! served greedily in chain order (height, then position in block) until the
//! supply runs out:
//!
//! ```text
//!   paid ──► requested = paid / price
//!            overpay   = paid - requested * price
//!            tokens    = min(requested, remaining)
//!            change    = overpay + price * (requested - tokens)
//!            remaining = remaining - tokens
//! ```
//!
//! Each buyer's entitlement depends on every earlier deposit, so allocation
//! is a left fold of [`settle`] over the deposits. [`resolve_purchase`] stops
//! at the buyer it is looking for; [`sale_ledger`] runs the whole window.

use std::fmt;

use tracing::trace;

use sealchain_protocol::config::CROWDSALE_PURCHASE_OUTPUTS;
use sealchain_protocol::ledger::{ChainIndex, ChainPosition, LedgerReference, Transaction, Txid};

use crate::contract::CrowdsaleContract;
use crate::error::VerifyError;

/// What one buyer receives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Purchase {
    /// Tokens bought.
    pub tokens: u64,
    /// Base-ledger units owed back, paid out as change tokens.
    pub change: u64,
}

impl Purchase {
    /// True when the buyer gets nothing at all.
    pub fn is_empty(&self) -> bool {
        self.tokens == 0 && self.change == 0
    }
}

impl fmt::Display for Purchase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} token(s), {} change", self.tokens, self.change)
    }
}

/// One step of the allocation fold: serves a deposit of `paid` against
/// `remaining` supply and returns the new remainder with the buyer's share.
///
/// A zero `price` sells nothing and refunds everything.
pub fn settle(remaining: u64, paid: u64, price: u64) -> (u64, Purchase) {
    let requested = paid.checked_div(price).unwrap_or(0);
    // requested * price <= paid, so neither of these can overflow.
    let overpay = paid - requested * price;
    let tokens = requested.min(remaining);
    let change = overpay + price * (requested - tokens);
    (remaining - tokens, Purchase { tokens, change })
}

/// A served deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub txid: Txid,
    pub position: ChainPosition,
    /// Units paid to the deposit address.
    pub paid: u64,
    pub purchase: Purchase,
}

/// Every deposit in a sale window and what it was allocated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaleLedger {
    /// Deposits in chain order.
    pub records: Vec<PurchaseRecord>,
    /// Supply left unsold after the last deposit.
    pub remaining: u64,
}

impl SaleLedger {
    pub fn tokens_sold(&self) -> u64 {
        self.records.iter().map(|r| r.purchase.tokens).sum()
    }

    pub fn record(&self, txid: &Txid) -> Option<&PurchaseRecord> {
        self.records.iter().find(|r| &r.txid == txid)
    }
}

/// Deposits to the sale address inside the window, with the amount each
/// paid. A deposit without exactly two outputs poisons the scan.
fn deposits<'a>(
    contract: &'a CrowdsaleContract,
    chain: &'a ChainIndex,
) -> impl Iterator<Item = Result<(ChainPosition, &'a Transaction, u64), VerifyError>> + 'a {
    let address = contract.deposit_address();
    chain
        .deposits(contract.from_height(), contract.to_height(), address)
        .map(move |(position, tx)| {
            trace!(txid = %tx.txid(), %position, "crowdsale deposit");
            if tx.output_count() != CROWDSALE_PURCHASE_OUTPUTS {
                return Err(VerifyError::MalformedPurchase {
                    txid: tx.txid().clone(),
                    outputs: tx.output_count(),
                });
            }
            Ok((position, tx, tx.amount_to(address)))
        })
}

/// Replays the sale up to the purchase committed to by `commitment` and
/// returns what that buyer is owed.
///
/// # Errors
///
/// - [`VerifyError::MalformedPurchase`] if an earlier (or the same) deposit
///   does not have exactly two outputs.
/// - [`VerifyError::PurchaseNotFound`] if the commitment's transaction is
///   not a deposit inside the window.
pub fn resolve_purchase(
    contract: &CrowdsaleContract,
    chain: &ChainIndex,
    commitment: &LedgerReference,
) -> Result<PurchaseRecord, VerifyError> {
    let not_found = || VerifyError::PurchaseNotFound {
        commitment: commitment.clone(),
    };
    let txid = commitment.txid().ok_or_else(not_found)?;

    let mut remaining = contract.total_supply();
    for deposit in deposits(contract, chain) {
        let (position, tx, paid) = deposit?;
        let (next, purchase) = settle(remaining, paid, contract.price());
        if tx.txid() == txid {
            return Ok(PurchaseRecord {
                txid: txid.clone(),
                position,
                paid,
                purchase,
            });
        }
        remaining = next;
    }
    Err(not_found())
}

/// Allocates every deposit in the window.
///
/// # Errors
///
/// [`VerifyError::MalformedPurchase`] on the first deposit without exactly
/// two outputs.
pub fn sale_ledger(
    contract: &CrowdsaleContract,
    chain: &ChainIndex,
) -> Result<SaleLedger, VerifyError> {
    deposits(contract, chain).try_fold(
        SaleLedger {
            records: Vec::new(),
            remaining: contract.total_supply(),
        },
        |mut ledger, deposit| -> Result<SaleLedger, VerifyError> {
            let (position, tx, paid) = deposit?;
            let (remaining, purchase) = settle(ledger.remaining, paid, contract.price());
            ledger.records.push(PurchaseRecord {
                txid: tx.txid().clone(),
                position,
                paid,
                purchase,
            });
            ledger.remaining = remaining;
            Ok(ledger)
        },
    )
}
