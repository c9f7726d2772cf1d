//! # Ledger References
//!
//! A [`LedgerReference`] names one output of one base-ledger transaction
//! (`txid:index`) and optionally what it pays (`destination`, `amount`).
//! Proofs and contracts commit to references; a reference doubles as a
//! *seal* that is closed by spending it on the base ledger.
//!
//! Equality and hashing are structural over `(txid, index, destination,
//! amount)`. The `spent` flag and the block-height back-reference are ledger
//! state, not identity, so two independently constructed references to the
//! same output compare equal regardless of what each has observed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LedgerError;

// ---------------------------------------------------------------------------
// Txid
// ---------------------------------------------------------------------------

/// Opaque base-ledger transaction identifier.
///
/// The model never interprets the contents; real deployments carry a
/// hex-encoded 32-byte hash, tests use short mnemonic strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Txid(String);

impl Txid {
    /// Wraps a transaction identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty identifier, which the model treats as
    /// "not yet known".
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Txid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Txid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// ChainPosition
// ---------------------------------------------------------------------------

/// Location of a transaction on the base ledger: `(height, position within
/// block)`.
///
/// The derived ordering (height first, then position) is the total order
/// used to rank crowdsale buyers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainPosition {
    /// Block height.
    pub height: u64,
    /// Zero-based index of the transaction within its block.
    pub position: usize,
}

impl fmt::Display for ChainPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.height, self.position)
    }
}

// ---------------------------------------------------------------------------
// LedgerReference
// ---------------------------------------------------------------------------

/// One output of a base-ledger transaction, possibly only partially known.
///
/// A reference without a `txid` describes an output of a transaction that
/// does not exist yet (e.g. the first output of the transaction that will
/// spend a seal). Only fully specified references may be committed to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerReference {
    txid: Option<Txid>,
    index: u32,
    #[serde(rename = "to")]
    destination: Option<String>,
    amount: Option<u64>,
    #[serde(skip)]
    spent: bool,
    #[serde(skip)]
    block_height: Option<u64>,
}

impl LedgerReference {
    /// Creates a bare `txid:index` reference. An empty txid is normalized
    /// to "unknown".
    pub fn new(txid: Option<Txid>, index: u32) -> Self {
        Self {
            txid: txid.filter(|t| !t.is_empty()),
            index,
            destination: None,
            amount: None,
            spent: false,
            block_height: None,
        }
    }

    /// Shorthand for a reference to output `index` of a known transaction.
    pub fn outpoint(txid: impl Into<Txid>, index: u32) -> Self {
        Self::new(Some(txid.into()), index)
    }

    /// Shorthand for output `index` of a transaction whose id is not known
    /// yet.
    pub fn unknown(index: u32) -> Self {
        Self::new(None, index)
    }

    /// Creates a fully described output reference.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidReference`] if `amount` is zero.
    pub fn output(
        txid: Option<Txid>,
        index: u32,
        destination: Option<String>,
        amount: Option<u64>,
    ) -> Result<Self, LedgerError> {
        let mut reference = Self::new(txid, index);
        if let Some(destination) = destination {
            reference = reference.with_destination(destination);
        }
        if let Some(amount) = amount {
            reference = reference.with_amount(amount)?;
        }
        Ok(reference)
    }

    /// Parses the `"txid:index"` form. An empty txid (`":0"`) yields a
    /// reference with an unknown transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidReference`] if the separator is missing
    /// or the index is not a non-negative integer.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        let (txid, index) = s
            .rsplit_once(':')
            .ok_or_else(|| LedgerError::InvalidReference {
                reason: format!("expected \"txid:index\", got {:?}", s),
            })?;

        let index = index
            .trim()
            .parse::<u32>()
            .map_err(|e| LedgerError::InvalidReference {
                reason: format!("bad output index in {:?}: {}", s, e),
            })?;

        Ok(Self::new(Some(Txid::new(txid.trim())), index))
    }

    /// Sets the destination address. An empty address is normalized to
    /// "unset".
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        self.destination = if destination.is_empty() {
            None
        } else {
            Some(destination)
        };
        self
    }

    /// Sets the base-ledger amount carried by the output.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidReference`] for a zero amount.
    pub fn with_amount(mut self, amount: u64) -> Result<Self, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidReference {
                reason: format!("output {} carries a zero amount", self),
            });
        }
        self.amount = Some(amount);
        Ok(self)
    }

    /// Records the height of the block containing the owning transaction.
    pub(crate) fn at_height(mut self, height: Option<u64>) -> Self {
        self.block_height = height;
        self
    }

    /// Transaction id, if known.
    pub fn txid(&self) -> Option<&Txid> {
        self.txid.as_ref()
    }

    /// Output index within the owning transaction.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Destination address, if known.
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Base-ledger amount, if known.
    pub fn amount(&self) -> Option<u64> {
        self.amount
    }

    /// Height of the block containing the owning transaction, when this
    /// reference was taken from a registered block.
    pub fn block_height(&self) -> Option<u64> {
        self.block_height
    }

    /// Whether the seal has been closed on the base ledger.
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Only references with a known txid may be committed to.
    pub fn is_fully_specified(&self) -> bool {
        self.txid.is_some()
    }

    /// Marks the output as spent. The transition is one-way.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadySpent`] if the flag is already set; the
    /// reference is left unchanged.
    pub fn spend(&mut self) -> Result<(), LedgerError> {
        if self.spent {
            return Err(LedgerError::AlreadySpent {
                reference: self.to_string(),
            });
        }
        self.spent = true;
        Ok(())
    }

    fn identity(&self) -> (Option<&Txid>, u32, Option<&str>, Option<u64>) {
        (
            self.txid.as_ref(),
            self.index,
            self.destination.as_deref(),
            self.amount,
        )
    }
}

impl PartialEq for LedgerReference {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for LedgerReference {}

impl Hash for LedgerReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for LedgerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.txid {
            Some(txid) => write!(f, "{}:{}", txid, self.index),
            None => write!(f, ":{}", self.index),
        }
    }
}

impl FromStr for LedgerReference {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_full_reference() {
        let r = LedgerReference::parse("asd:1").unwrap();
        assert_eq!(r.txid(), Some(&Txid::new("asd")));
        assert_eq!(r.index(), 1);
        assert!(r.is_fully_specified());
        assert!(!r.is_spent());
    }

    #[test]
    fn parse_empty_txid_is_unknown() {
        let r: LedgerReference = ":0".parse().unwrap();
        assert!(r.txid().is_none());
        assert!(!r.is_fully_specified());
        assert_eq!(r, LedgerReference::unknown(0));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!(
            LedgerReference::parse("no-separator"),
            Err(LedgerError::InvalidReference { .. })
        ));
        assert!(matches!(
            LedgerReference::parse("abc:-1"),
            Err(LedgerError::InvalidReference { .. })
        ));
        assert!(matches!(
            LedgerReference::parse("abc:x"),
            Err(LedgerError::InvalidReference { .. })
        ));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let r = LedgerReference::outpoint("deadbeef", 7);
        assert_eq!(r.to_string(), "deadbeef:7");
        assert_eq!(LedgerReference::parse(&r.to_string()).unwrap(), r);
    }

    #[test]
    fn spend_is_one_way() {
        let mut r = LedgerReference::outpoint("tx", 0);
        r.spend().unwrap();
        assert!(r.is_spent());

        match r.spend() {
            Err(LedgerError::AlreadySpent { reference }) => assert_eq!(reference, "tx:0"),
            other => panic!("expected AlreadySpent, got {:?}", other),
        }
        assert!(r.is_spent());
    }

    #[test]
    fn equality_ignores_spent_flag() {
        let mut a = LedgerReference::outpoint("tx", 0);
        let b = LedgerReference::outpoint("tx", 0);
        a.spend().unwrap();
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn equality_is_structural_over_destination_and_amount() {
        let bare = LedgerReference::outpoint("tx", 0);
        let paid = LedgerReference::outpoint("tx", 0)
            .with_destination("addr")
            .with_amount(5)
            .unwrap();
        assert_ne!(bare, paid);
        assert_ne!(
            paid,
            LedgerReference::outpoint("tx", 0)
                .with_destination("addr")
                .with_amount(6)
                .unwrap()
        );
    }

    #[test]
    fn empty_destination_is_normalized() {
        let r = LedgerReference::outpoint("tx", 0).with_destination("");
        assert_eq!(r.destination(), None);
        assert_eq!(r, LedgerReference::outpoint("tx", 0));
    }

    #[test]
    fn zero_amount_rejected() {
        assert!(matches!(
            LedgerReference::output(Some(Txid::new("tx")), 0, None, Some(0)),
            Err(LedgerError::InvalidReference { .. })
        ));
    }

    #[test]
    fn empty_txid_normalized_on_construction() {
        let r = LedgerReference::new(Some(Txid::new("")), 3);
        assert!(!r.is_fully_specified());
        assert_eq!(r.to_string(), ":3");
    }

    #[test]
    fn chain_position_orders_by_height_then_position() {
        let a = ChainPosition { height: 10, position: 5 };
        let b = ChainPosition { height: 11, position: 0 };
        let c = ChainPosition { height: 11, position: 1 };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn json_form_uses_wire_field_names() {
        let r = LedgerReference::outpoint("tx", 1).with_destination("addr");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["txid"], "tx");
        assert_eq!(json["to"], "addr");
        assert!(json.get("spent").is_none());
    }
}
