//! # Asset Outputs & Token Identity
//!
//! Tokens are never recorded on the base ledger. A token exists as an
//! [`AssetOutput`] inside a proof: "this many units of token `T` now belong
//! to whoever can spend ledger reference `R`".
//!
//! A [`TokenId`] is the SHA-256 of the issuing contract's canonical bytes.
//! It is derived, never chosen, so the same contract terms always produce
//! the same token and no registry is needed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::TOKEN_ID_LENGTH;
use crate::ledger::{LedgerError, LedgerReference};

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Opaque 256-bit token identifier.
///
/// Serializes as a hex string in human-readable formats (JSON) and as raw
/// bytes in binary formats (bincode).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId([u8; TOKEN_ID_LENGTH]);

impl TokenId {
    /// Creates a `TokenId` from a raw digest.
    pub fn from_bytes(bytes: [u8; TOKEN_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte identifier.
    pub fn as_bytes(&self) -> &[u8; TOKEN_ID_LENGTH] {
        &self.0
    }

    /// Returns the hex-encoded token id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded token id.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != TOKEN_ID_LENGTH {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; TOKEN_ID_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// First six bytes in hex, for logs and error messages.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({}...)", self.short())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for TokenId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; TOKEN_ID_LENGTH]>::deserialize(deserializer).map(Self)
        }
    }
}

// ---------------------------------------------------------------------------
// AssetOutput
// ---------------------------------------------------------------------------

/// An allocation of `amount` units of `token_id` to `destination`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetOutput {
    token_id: TokenId,
    amount: u64,
    #[serde(rename = "to")]
    destination: LedgerReference,
}

impl AssetOutput {
    /// Creates an asset output.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] for a zero amount. The upper
    /// bound (`< 2^64`) is enforced by the type.
    pub fn new(
        token_id: TokenId,
        amount: u64,
        destination: LedgerReference,
    ) -> Result<Self, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        Ok(Self {
            token_id,
            amount,
            destination,
        })
    }

    /// Token being allocated.
    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    /// Units allocated.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Ledger reference whose spender controls the units.
    pub fn destination(&self) -> &LedgerReference {
        &self.destination
    }
}

impl fmt::Display for AssetOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of token {} -> {}",
            self.amount,
            self.token_id.short(),
            self.destination
        )
    }
}

// ---------------------------------------------------------------------------
// Token totals
// ---------------------------------------------------------------------------

/// Per-token sums. Accumulated in `u128` so that any number of `u64`
/// outputs can be added without overflow.
pub type TokenTotals = BTreeMap<TokenId, u128>;

/// Adds `amount` of `token_id` to `totals`.
pub fn accumulate(totals: &mut TokenTotals, token_id: TokenId, amount: u64) {
    *totals.entry(token_id).or_insert(0) += u128::from(amount);
}

/// Sums a set of outputs per token.
pub fn tally<'a>(outputs: impl IntoIterator<Item = &'a AssetOutput>) -> TokenTotals {
    let mut totals = TokenTotals::new();
    for output in outputs {
        accumulate(&mut totals, output.token_id, output.amount);
    }
    totals
}

/// Renders totals as `{abcdef012345: 10, ...}` for error messages.
pub fn render_totals(totals: &TokenTotals) -> String {
    let body: Vec<String> = totals
        .iter()
        .map(|(token, amount)| format!("{}: {}", token.short(), amount))
        .collect();
    format!("{{{}}}", body.join(", "))
}
