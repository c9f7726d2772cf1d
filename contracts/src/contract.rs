//! # Asset Contracts
//!
//! A contract fixes the terms of a token: its title, total supply, and the
//! ledger reference (the *issuance seal*) that is spent to publish it. The
//! token id is the SHA-256 of the terms in canonical form, so two parties
//! holding the same terms always agree on the token without a registry.
//!
//! ```text
//!   Contract
//!   ├── Plain      issuance seal ──► one output of `total_supply` to the owner
//!   └── Crowdsale  issuance seal ──► sold for base-ledger payments to
//!                                    `deposit_address` within [from, to]
//! ```
//!
//! Terms never change after construction. The only mutable bit a contract
//! carries is the spent state of its issuance reference, which mirrors the
//! base ledger and does not feed into the token id.

use std::fmt;
use std::ops::RangeInclusive;

use serde_json::{json, Map, Value};

use sealchain_protocol::asset::TokenId;
use sealchain_protocol::config::{
    CHANGE_TOKEN_DOMAIN, CONTRACT_TYPE_CROWDSALE, CONTRACT_TYPE_GENERIC,
};
use sealchain_protocol::crypto::{sha256_array, tagged_sha256};
use sealchain_protocol::ledger::{LedgerError, LedgerReference};

use crate::error::ContractError;

// ---------------------------------------------------------------------------
// Canonical form
// ---------------------------------------------------------------------------

/// Issuance-time form of a reference: txid and index, plus the destination
/// and amount when known. Spent state and block height are ledger state,
/// not terms, and never appear.
///
/// Keys are inserted in sorted order so the bytes are the same whether or
/// not serde_json preserves insertion order.
fn canonical_reference(reference: &LedgerReference) -> Value {
    let mut map = Map::new();
    if let Some(amount) = reference.amount() {
        map.insert("amount".into(), Value::from(amount));
    }
    map.insert("index".into(), Value::from(reference.index()));
    if let Some(destination) = reference.destination() {
        map.insert("to".into(), Value::String(destination.to_owned()));
    }
    map.insert(
        "txid".into(),
        match reference.txid() {
            Some(txid) => Value::String(txid.as_str().to_owned()),
            None => Value::Null,
        },
    );
    Value::Object(map)
}

fn invalid_terms(reason: impl Into<String>) -> ContractError {
    ContractError::InvalidTerms {
        reason: reason.into(),
    }
}

fn check_issuance(
    issuance_reference: &LedgerReference,
    total_supply: u64,
) -> Result<(), ContractError> {
    if total_supply == 0 {
        return Err(invalid_terms("total supply must be positive"));
    }
    if !issuance_reference.is_fully_specified() {
        return Err(invalid_terms(format!(
            "issuance reference {} has no transaction id",
            issuance_reference
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PlainContract
// ---------------------------------------------------------------------------

/// Issues the whole supply to a single owner reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlainContract {
    title: String,
    issuance_reference: LedgerReference,
    total_supply: u64,
    owner_reference: LedgerReference,
}

impl PlainContract {
    /// Creates a plain contract.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidTerms`] if the supply is zero or the issuance
    /// reference is not fully specified.
    pub fn new(
        title: impl Into<String>,
        issuance_reference: LedgerReference,
        owner_reference: LedgerReference,
        total_supply: u64,
    ) -> Result<Self, ContractError> {
        check_issuance(&issuance_reference, total_supply)?;
        Ok(Self {
            title: title.into(),
            issuance_reference,
            total_supply,
            owner_reference,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn issuance_reference(&self) -> &LedgerReference {
        &self.issuance_reference
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Reference that receives the whole supply at issuance.
    pub fn owner_reference(&self) -> &LedgerReference {
        &self.owner_reference
    }

    /// Canonical JSON value of the terms. Object keys are sorted.
    pub fn canonical_value(&self) -> Value {
        json!({
            "issuance_reference": canonical_reference(&self.issuance_reference),
            "owner_reference": canonical_reference(&self.owner_reference),
            "title": self.title,
            "total_supply": self.total_supply,
            "type": CONTRACT_TYPE_GENERIC,
        })
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_value().to_string().into_bytes()
    }

    pub fn token_id(&self) -> TokenId {
        TokenId::from_bytes(sha256_array(&self.canonical_bytes()))
    }

    /// Whether the contract was published on the base ledger.
    ///
    /// Stands in for checking an on-chain commitment to the terms: a
    /// contract counts as published once its issuance seal is spent.
    pub fn verify(&self) -> bool {
        self.issuance_reference.is_spent()
    }

    /// Marks the issuance seal spent.
    pub fn spend_issuance(&mut self) -> Result<(), LedgerError> {
        self.issuance_reference.spend()
    }
}

// ---------------------------------------------------------------------------
// CrowdsaleContract
// ---------------------------------------------------------------------------

/// Sells the supply at a fixed price for base-ledger payments made to
/// `deposit_address` between `from_height` and `to_height` inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrowdsaleContract {
    title: String,
    issuance_reference: LedgerReference,
    total_supply: u64,
    price: u64,
    from_height: u64,
    to_height: u64,
    deposit_address: String,
}

impl CrowdsaleContract {
    /// Creates a crowdsale contract.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidTerms`] if the supply or price is zero, the
    /// issuance reference is not fully specified, `from_height` is zero,
    /// `to_height <= from_height`, or the deposit address is empty.
    pub fn new(
        title: impl Into<String>,
        issuance_reference: LedgerReference,
        total_supply: u64,
        price: u64,
        from_height: u64,
        to_height: u64,
        deposit_address: impl Into<String>,
    ) -> Result<Self, ContractError> {
        check_issuance(&issuance_reference, total_supply)?;
        if from_height == 0 {
            return Err(invalid_terms("sale window must start at height 1 or later"));
        }
        if to_height <= from_height {
            return Err(invalid_terms(format!(
                "sale window [{}, {}] is empty or inverted",
                from_height, to_height
            )));
        }
        if price == 0 {
            return Err(invalid_terms("price must be positive"));
        }
        let deposit_address = deposit_address.into();
        if deposit_address.is_empty() {
            return Err(invalid_terms("deposit address must not be empty"));
        }
        Ok(Self {
            title: title.into(),
            issuance_reference,
            total_supply,
            price,
            from_height,
            to_height,
            deposit_address,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn issuance_reference(&self) -> &LedgerReference {
        &self.issuance_reference
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Base-ledger units per token.
    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn from_height(&self) -> u64 {
        self.from_height
    }

    pub fn to_height(&self) -> u64 {
        self.to_height
    }

    pub fn deposit_address(&self) -> &str {
        &self.deposit_address
    }

    pub fn sale_window(&self) -> RangeInclusive<u64> {
        self.from_height..=self.to_height
    }

    /// Whether a block at `height` falls inside the sale window.
    pub fn covers(&self, height: u64) -> bool {
        self.sale_window().contains(&height)
    }

    pub fn canonical_value(&self) -> Value {
        json!({
            "deposit_address": self.deposit_address,
            "from_height": self.from_height,
            "issuance_reference": canonical_reference(&self.issuance_reference),
            "price": self.price,
            "title": self.title,
            "to_height": self.to_height,
            "total_supply": self.total_supply,
            "type": CONTRACT_TYPE_CROWDSALE,
        })
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_value().to_string().into_bytes()
    }

    pub fn token_id(&self) -> TokenId {
        TokenId::from_bytes(sha256_array(&self.canonical_bytes()))
    }

    /// Id of the token that represents refunds owed to buyers. Derived from
    /// the same terms under a separate domain, so it never equals
    /// [`token_id`](Self::token_id).
    pub fn change_token_id(&self) -> TokenId {
        TokenId::from_bytes(tagged_sha256(CHANGE_TOKEN_DOMAIN, &self.canonical_bytes()))
    }

    /// See [`PlainContract::verify`].
    pub fn verify(&self) -> bool {
        self.issuance_reference.is_spent()
    }

    pub fn spend_issuance(&mut self) -> Result<(), LedgerError> {
        self.issuance_reference.spend()
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Any contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Contract {
    Plain(PlainContract),
    Crowdsale(CrowdsaleContract),
}

impl Contract {
    /// Type tag used in the canonical and wire forms.
    pub fn kind(&self) -> &'static str {
        match self {
            Contract::Plain(_) => CONTRACT_TYPE_GENERIC,
            Contract::Crowdsale(_) => CONTRACT_TYPE_CROWDSALE,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Contract::Plain(c) => c.title(),
            Contract::Crowdsale(c) => c.title(),
        }
    }

    pub fn issuance_reference(&self) -> &LedgerReference {
        match self {
            Contract::Plain(c) => c.issuance_reference(),
            Contract::Crowdsale(c) => c.issuance_reference(),
        }
    }

    pub fn total_supply(&self) -> u64 {
        match self {
            Contract::Plain(c) => c.total_supply(),
            Contract::Crowdsale(c) => c.total_supply(),
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Contract::Plain(c) => c.canonical_bytes(),
            Contract::Crowdsale(c) => c.canonical_bytes(),
        }
    }

    pub fn token_id(&self) -> TokenId {
        match self {
            Contract::Plain(c) => c.token_id(),
            Contract::Crowdsale(c) => c.token_id(),
        }
    }

    /// Change token id; only crowdsales have one.
    pub fn change_token_id(&self) -> Option<TokenId> {
        match self {
            Contract::Plain(_) => None,
            Contract::Crowdsale(c) => Some(c.change_token_id()),
        }
    }

    pub fn verify(&self) -> bool {
        match self {
            Contract::Plain(c) => c.verify(),
            Contract::Crowdsale(c) => c.verify(),
        }
    }

    pub fn spend_issuance(&mut self) -> Result<(), LedgerError> {
        match self {
            Contract::Plain(c) => c.spend_issuance(),
            Contract::Crowdsale(c) => c.spend_issuance(),
        }
    }

    pub fn as_plain(&self) -> Option<&PlainContract> {
        match self {
            Contract::Plain(c) => Some(c),
            Contract::Crowdsale(_) => None,
        }
    }

    pub fn as_crowdsale(&self) -> Option<&CrowdsaleContract> {
        match self {
            Contract::Crowdsale(c) => Some(c),
            Contract::Plain(_) => None,
        }
    }
}

impl From<PlainContract> for Contract {
    fn from(contract: PlainContract) -> Self {
        Contract::Plain(contract)
    }
}

impl From<CrowdsaleContract> for Contract {
    fn from(contract: CrowdsaleContract) -> Self {
        Contract::Crowdsale(contract)
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Contract (type={}) {:?}, token id = {}, committed to {}, total issuance of {}",
            self.kind(),
            self.title(),
            self.token_id().short(),
            self.issuance_reference(),
            self.total_supply()
        )?;
        if let Contract::Crowdsale(c) = self {
            write!(
                f,
                ", sold at {} per token to {} during [{}, {}]",
                c.price, c.deposit_address, c.from_height, c.to_height
            )?;
        }
        Ok(())
    }
}
