//! # Wire Encoding
//!
//! Contracts and proofs travel between holders as bincode (binary) or JSON.
//! Both go through the same plain wire structs, which carry no invariants;
//! decoding rebuilds the domain types through their constructors, so a
//! decoded value is as trustworthy as one built locally.
//!
//! A proof tree is sent as a flat node table, breadth-first with the root
//! first. Each node names its inputs by table index, and every index points
//! further down the table, so the table is acyclic by construction and
//! neither side of the codec has to recurse:
//!
//! ```text
//!   Envelope { version, body: WireProof }
//!   WireProof { nodes: [WireNode] }          nodes[0] is the root
//!   WireNode
//!   ├── commitment           WireReference
//!   ├── inputs               Option<Vec<u64>>         (None when skipped)
//!   ├── outputs              Vec<WireOutput>
//!   ├── issuance             Option<WireContract>     (issuance proofs)
//!   └── crowdsale_purchase   Option<WireContract>     (purchase proofs)
//! ```
//!
//! Decoding rejects tables that are not a tree rooted at node 0 and tables
//! deeper than [`DecodeOptions::max_depth`]. Binary payloads are capped at
//! [`MAX_WIRE_PAYLOAD_BYTES`] in both directions.
//!
//! Spent state and block heights are ledger state and never cross the
//! wire. A receiver re-derives them from its own view of the chain, see
//! [`Proof::mark_spent`].
//!
//! With [`EncodeOptions::skip_inputs`] a transfer is sent without its input
//! proofs; the receiver gets a transfer with no inputs, which only verifies
//! if it also allocates nothing.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use sealchain_protocol::asset::{AssetOutput, TokenId};
use sealchain_protocol::config::{
    CONTRACT_TYPE_CROWDSALE, CONTRACT_TYPE_GENERIC, DEFAULT_MAX_PROOF_DEPTH,
    MAX_WIRE_PAYLOAD_BYTES, WIRE_FORMAT_VERSION,
};
use sealchain_protocol::ledger::{LedgerError, LedgerReference, Txid};

use crate::contract::{Contract, CrowdsaleContract, PlainContract};
use crate::error::{CodecError, ContractError};
use crate::proof::{IssuanceProof, Proof, PurchaseProof, TransferProof};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Encoding switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Omit input proofs entirely.
    pub skip_inputs: bool,
}

impl EncodeOptions {
    pub fn skip_inputs() -> Self {
        Self { skip_inputs: true }
    }
}

/// Decoding limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Deepest proof level accepted below the root.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_PROOF_DEPTH,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Envelope<T> {
    version: u16,
    body: T,
}

/// Wire form of a [`LedgerReference`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireReference {
    pub txid: Option<String>,
    pub index: u32,
    pub to: Option<String>,
    pub amount: Option<u64>,
}

/// Wire form of an [`AssetOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOutput {
    pub token_id: TokenId,
    pub amount: u64,
    pub to: WireReference,
}

/// Wire form of a [`Contract`]. Fields a contract type does not use are
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireContract {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub issuance_reference: WireReference,
    pub total_supply: u64,
    pub owner_reference: Option<WireReference>,
    pub price: Option<u64>,
    pub from_height: Option<u64>,
    pub to_height: Option<u64>,
    pub deposit_address: Option<String>,
}

/// One proof in a [`WireProof`] table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireNode {
    pub commitment: WireReference,
    /// Table indices of the input proofs, in input order. `None` when the
    /// inputs were skipped.
    pub inputs: Option<Vec<u64>>,
    pub outputs: Vec<WireOutput>,
    pub issuance: Option<WireContract>,
    pub crowdsale_purchase: Option<WireContract>,
}

/// Wire form of a [`Proof`]: the proof tree flattened breadth-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireProof {
    pub nodes: Vec<WireNode>,
}

// ---------------------------------------------------------------------------
// Domain -> wire
// ---------------------------------------------------------------------------

impl From<&LedgerReference> for WireReference {
    fn from(reference: &LedgerReference) -> Self {
        Self {
            txid: reference.txid().map(|t| t.as_str().to_owned()),
            index: reference.index(),
            to: reference.destination().map(str::to_owned),
            amount: reference.amount(),
        }
    }
}

impl From<&AssetOutput> for WireOutput {
    fn from(output: &AssetOutput) -> Self {
        Self {
            token_id: output.token_id(),
            amount: output.amount(),
            to: output.destination().into(),
        }
    }
}

impl From<&PlainContract> for WireContract {
    fn from(contract: &PlainContract) -> Self {
        Self {
            kind: CONTRACT_TYPE_GENERIC.to_string(),
            title: contract.title().to_string(),
            issuance_reference: contract.issuance_reference().into(),
            total_supply: contract.total_supply(),
            owner_reference: Some(contract.owner_reference().into()),
            price: None,
            from_height: None,
            to_height: None,
            deposit_address: None,
        }
    }
}

impl From<&CrowdsaleContract> for WireContract {
    fn from(contract: &CrowdsaleContract) -> Self {
        Self {
            kind: CONTRACT_TYPE_CROWDSALE.to_string(),
            title: contract.title().to_string(),
            issuance_reference: contract.issuance_reference().into(),
            total_supply: contract.total_supply(),
            owner_reference: None,
            price: Some(contract.price()),
            from_height: Some(contract.from_height()),
            to_height: Some(contract.to_height()),
            deposit_address: Some(contract.deposit_address().to_string()),
        }
    }
}

impl From<&Contract> for WireContract {
    fn from(contract: &Contract) -> Self {
        match contract {
            Contract::Plain(c) => c.into(),
            Contract::Crowdsale(c) => c.into(),
        }
    }
}

impl WireNode {
    fn new(proof: &Proof, inputs: Option<Vec<u64>>) -> Self {
        let (issuance, crowdsale_purchase) = match proof {
            Proof::Transfer(_) => (None, None),
            Proof::Issuance(p) => (Some(p.contract().into()), None),
            Proof::CrowdsalePurchase(p) => (None, Some(p.contract().into())),
        };
        Self {
            commitment: proof.commitment().into(),
            inputs,
            outputs: proof.outputs().iter().map(WireOutput::from).collect(),
            issuance,
            crowdsale_purchase,
        }
    }
}

impl WireProof {
    /// Builds the wire form of `proof`. Unless `options.skip_inputs` is set
    /// the whole input tree is flattened into the table; otherwise the table
    /// holds the root alone.
    pub fn from_proof(proof: &Proof, options: EncodeOptions) -> Self {
        let mut queue = vec![proof];
        let mut nodes = Vec::new();
        let mut next = 0;
        while let Some(&current) = queue.get(next) {
            next += 1;
            let inputs = if options.skip_inputs {
                None
            } else {
                let first = queue.len() as u64;
                queue.extend(current.inputs());
                Some((first..queue.len() as u64).collect())
            };
            nodes.push(WireNode::new(current, inputs));
        }
        Self { nodes }
    }

    /// Rebuilds the proof tree, rejecting tables that are not a tree rooted
    /// at node 0 or that nest deeper than `options.max_depth`.
    pub fn into_proof(self, options: DecodeOptions) -> Result<Proof, CodecError> {
        let children = self.check_shape(options.max_depth)?;

        // Inputs always sit further down the table, so building back to
        // front finds every input already built.
        let mut built: Vec<Option<Proof>> = Vec::new();
        built.resize_with(self.nodes.len(), || None);
        for ((index, node), inputs) in self.nodes.into_iter().enumerate().zip(children).rev() {
            let inputs: Vec<Proof> = inputs.iter().filter_map(|&i| built[i].take()).collect();
            built[index] = Some(node.into_proof(inputs)?);
        }
        built
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| malformed("empty proof table"))
    }

    /// Validates the table's links and returns each node's input indices.
    fn check_shape(&self, max_depth: usize) -> Result<Vec<Vec<usize>>, CodecError> {
        let count = self.nodes.len();
        if count == 0 {
            return Err(malformed("empty proof table"));
        }

        let mut depths: Vec<Option<usize>> = vec![None; count];
        depths[0] = Some(0);
        let mut children = Vec::with_capacity(count);
        for (index, node) in self.nodes.iter().enumerate() {
            let depth = depths[index]
                .ok_or_else(|| malformed(format!("node {} is not an input of any proof", index)))?;
            let mut inputs = Vec::new();
            for &raw in node.inputs.iter().flatten() {
                let child = usize::try_from(raw)
                    .ok()
                    .filter(|&child| child > index && child < count)
                    .ok_or_else(|| {
                        malformed(format!("node {} names input {} out of order", index, raw))
                    })?;
                if depths[child].is_some() {
                    return Err(malformed(format!("node {} is an input twice", child)));
                }
                if depth + 1 > max_depth {
                    return Err(CodecError::DepthExceeded { limit: max_depth });
                }
                depths[child] = Some(depth + 1);
                inputs.push(child);
            }
            children.push(inputs);
        }
        Ok(children)
    }
}

// ---------------------------------------------------------------------------
// Wire -> domain
// ---------------------------------------------------------------------------

impl TryFrom<WireReference> for LedgerReference {
    type Error = LedgerError;

    fn try_from(wire: WireReference) -> Result<Self, Self::Error> {
        LedgerReference::output(wire.txid.map(Txid::new), wire.index, wire.to, wire.amount)
    }
}

impl TryFrom<WireOutput> for AssetOutput {
    type Error = LedgerError;

    fn try_from(wire: WireOutput) -> Result<Self, Self::Error> {
        AssetOutput::new(wire.token_id, wire.amount, wire.to.try_into()?)
    }
}

fn missing(kind: &str, field: &str) -> ContractError {
    ContractError::InvalidTerms {
        reason: format!("{} contract without {}", kind, field),
    }
}

impl TryFrom<WireContract> for Contract {
    type Error = ContractError;

    fn try_from(wire: WireContract) -> Result<Self, Self::Error> {
        let issuance_reference = LedgerReference::try_from(wire.issuance_reference)?;
        match wire.kind.as_str() {
            CONTRACT_TYPE_GENERIC => {
                let owner = wire
                    .owner_reference
                    .ok_or_else(|| missing(CONTRACT_TYPE_GENERIC, "owner_reference"))?;
                Ok(PlainContract::new(
                    wire.title,
                    issuance_reference,
                    owner.try_into()?,
                    wire.total_supply,
                )?
                .into())
            }
            CONTRACT_TYPE_CROWDSALE => {
                let kind = CONTRACT_TYPE_CROWDSALE;
                Ok(CrowdsaleContract::new(
                    wire.title,
                    issuance_reference,
                    wire.total_supply,
                    wire.price.ok_or_else(|| missing(kind, "price"))?,
                    wire.from_height.ok_or_else(|| missing(kind, "from_height"))?,
                    wire.to_height.ok_or_else(|| missing(kind, "to_height"))?,
                    wire.deposit_address
                        .ok_or_else(|| missing(kind, "deposit_address"))?,
                )?
                .into())
            }
            other => Err(ContractError::UnknownContractType(other.to_string())),
        }
    }
}

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::MalformedTable {
        reason: reason.into(),
    }
}

fn reject_inputs(
    variant: &'static str,
    commitment: &LedgerReference,
    inputs: &Option<Vec<u64>>,
) -> Result<(), CodecError> {
    match inputs {
        Some(inputs) if !inputs.is_empty() => Err(CodecError::UnexpectedInputs {
            variant,
            commitment: commitment.to_string(),
        }),
        _ => Ok(()),
    }
}

impl WireNode {
    /// Builds the proof for this node around its already-built inputs.
    fn into_proof(self, inputs: Vec<Proof>) -> Result<Proof, CodecError> {
        let commitment = LedgerReference::try_from(self.commitment)?;
        let outputs = self
            .outputs
            .into_iter()
            .map(AssetOutput::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        match (self.issuance, self.crowdsale_purchase) {
            (Some(_), Some(_)) => Err(CodecError::ConflictingPayload),
            (Some(contract), None) => {
                reject_inputs("issuance", &commitment, &self.inputs)?;
                match Contract::try_from(contract)? {
                    Contract::Plain(contract) => {
                        Ok(IssuanceProof::from_parts(commitment, contract, outputs)?.into())
                    }
                    other => Err(CodecError::PayloadMismatch {
                        variant: "issuance",
                        found: other.kind().to_string(),
                    }),
                }
            }
            (None, Some(contract)) => {
                reject_inputs("crowdsale purchase", &commitment, &self.inputs)?;
                match Contract::try_from(contract)? {
                    Contract::Crowdsale(contract) => {
                        Ok(PurchaseProof::new(commitment, contract, outputs)?.into())
                    }
                    other => Err(CodecError::PayloadMismatch {
                        variant: "crowdsale purchase",
                        found: other.kind().to_string(),
                    }),
                }
            }
            (None, None) => Ok(TransferProof::new(commitment, inputs, outputs)?.into()),
        }
    }
}

impl TryFrom<WireProof> for Proof {
    type Error = CodecError;

    fn try_from(wire: WireProof) -> Result<Self, Self::Error> {
        wire.into_proof(DecodeOptions::default())
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

fn binary_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_WIRE_PAYLOAD_BYTES)
}

fn to_binary<T: Serialize>(body: T) -> Result<Vec<u8>, CodecError> {
    Ok(binary_options().serialize(&Envelope {
        version: WIRE_FORMAT_VERSION,
        body,
    })?)
}

fn from_binary<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let envelope: Envelope<T> = binary_options().deserialize(bytes)?;
    check_version(envelope.version)?;
    Ok(envelope.body)
}

fn to_json<T: Serialize>(body: T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&Envelope {
        version: WIRE_FORMAT_VERSION,
        body,
    })?)
}

fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    let envelope: Envelope<T> = serde_json::from_str(text)?;
    check_version(envelope.version)?;
    Ok(envelope.body)
}

fn check_version(found: u16) -> Result<(), CodecError> {
    if found != WIRE_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found,
            expected: WIRE_FORMAT_VERSION,
        });
    }
    Ok(())
}

/// Encodes a proof with bincode.
pub fn encode_proof(proof: &Proof, options: EncodeOptions) -> Result<Vec<u8>, CodecError> {
    to_binary(WireProof::from_proof(proof, options))
}

/// Decodes a bincode proof with default limits. Every reference comes back
/// unspent.
pub fn decode_proof(bytes: &[u8]) -> Result<Proof, CodecError> {
    decode_proof_with(bytes, DecodeOptions::default())
}

pub fn decode_proof_with(bytes: &[u8], options: DecodeOptions) -> Result<Proof, CodecError> {
    from_binary::<WireProof>(bytes)?.into_proof(options)
}

pub fn proof_to_json(proof: &Proof, options: EncodeOptions) -> Result<String, CodecError> {
    to_json(WireProof::from_proof(proof, options))
}

pub fn proof_from_json(text: &str) -> Result<Proof, CodecError> {
    proof_from_json_with(text, DecodeOptions::default())
}

pub fn proof_from_json_with(text: &str, options: DecodeOptions) -> Result<Proof, CodecError> {
    from_json::<WireProof>(text)?.into_proof(options)
}

pub fn encode_contract(contract: &Contract) -> Result<Vec<u8>, CodecError> {
    to_binary(WireContract::from(contract))
}

pub fn decode_contract(bytes: &[u8]) -> Result<Contract, CodecError> {
    Ok(from_binary::<WireContract>(bytes)?.try_into()?)
}

pub fn contract_to_json(contract: &Contract) -> Result<String, CodecError> {
    to_json(WireContract::from(contract))
}

pub fn contract_from_json(text: &str) -> Result<Contract, CodecError> {
    Ok(from_json::<WireContract>(text)?.try_into()?)
}
