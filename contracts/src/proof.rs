//! # Proofs
//!
//! A proof attests "these asset outputs are valid, and they are committed
//! to by the spend of this ledger reference". Proofs form a DAG rooted at
//! issuances and crowdsale purchases:
//!
//! ```text
//!            Transfer (commitment c3)
//!           /                        \
//!   Transfer (c2)               Issuance (c1, contract)
//!        |
//!   CrowdsalePurchase (c0, contract)
//! ```
//!
//! A transfer's outputs must conserve, per token, exactly what its inputs
//! sent to its commitment. Issuance and purchase proofs are leaves whose
//! outputs are dictated by their contract. See [`crate::verifier`] for the
//! checks.

use std::fmt;

use sealchain_protocol::asset::AssetOutput;
use sealchain_protocol::ledger::{ChainIndex, LedgerError, LedgerReference};

use crate::contract::{CrowdsaleContract, PlainContract};
use crate::error::{ContractError, VerifyError};
use crate::verifier::{VerificationReport, Verifier};

fn check_commitment(commitment: &LedgerReference) -> Result<(), ContractError> {
    if commitment.is_fully_specified() {
        Ok(())
    } else {
        Err(ContractError::InvalidReference {
            reference: commitment.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

/// Moves assets received by `commitment` from `inputs` into `outputs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferProof {
    commitment: LedgerReference,
    inputs: Vec<Proof>,
    outputs: Vec<AssetOutput>,
}

impl TransferProof {
    /// Creates a transfer proof.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidReference`] if the commitment has no txid.
    pub fn new(
        commitment: LedgerReference,
        inputs: Vec<Proof>,
        outputs: Vec<AssetOutput>,
    ) -> Result<Self, ContractError> {
        check_commitment(&commitment)?;
        Ok(Self {
            commitment,
            inputs,
            outputs,
        })
    }

    pub fn commitment(&self) -> &LedgerReference {
        &self.commitment
    }

    pub fn inputs(&self) -> &[Proof] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[AssetOutput] {
        &self.outputs
    }
}

// ---------------------------------------------------------------------------
// Issuance
// ---------------------------------------------------------------------------

/// Creates the whole supply of a plain contract for its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuanceProof {
    commitment: LedgerReference,
    contract: PlainContract,
    outputs: Vec<AssetOutput>,
}

impl IssuanceProof {
    /// Creates the issuance proof for `contract`, allocating the total
    /// supply to the owner reference.
    ///
    /// # Errors
    ///
    /// - [`ContractError::InvalidReference`] if the commitment has no txid.
    /// - [`ContractError::IssuanceMismatch`] if the commitment is not the
    ///   contract's issuance reference.
    pub fn new(
        commitment: LedgerReference,
        contract: PlainContract,
    ) -> Result<Self, ContractError> {
        let output = AssetOutput::new(
            contract.token_id(),
            contract.total_supply(),
            contract.owner_reference().clone(),
        )?;
        Self::from_parts(commitment, contract, vec![output])
    }

    /// Rebuilds an issuance proof with the outputs it was transmitted with.
    /// Whether those outputs match the contract is left to verification.
    pub(crate) fn from_parts(
        commitment: LedgerReference,
        contract: PlainContract,
        outputs: Vec<AssetOutput>,
    ) -> Result<Self, ContractError> {
        check_commitment(&commitment)?;
        if contract.issuance_reference() != &commitment {
            return Err(ContractError::IssuanceMismatch {
                commitment: commitment.to_string(),
                issuance: contract.issuance_reference().to_string(),
            });
        }
        Ok(Self {
            commitment,
            contract,
            outputs,
        })
    }

    pub fn commitment(&self) -> &LedgerReference {
        &self.commitment
    }

    pub fn contract(&self) -> &PlainContract {
        &self.contract
    }

    pub fn outputs(&self) -> &[AssetOutput] {
        &self.outputs
    }
}

// ---------------------------------------------------------------------------
// Crowdsale purchase
// ---------------------------------------------------------------------------

/// Claims a buyer's tokens and change from a crowdsale. `commitment` is an
/// output of the buyer's purchase transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseProof {
    commitment: LedgerReference,
    contract: CrowdsaleContract,
    outputs: Vec<AssetOutput>,
}

impl PurchaseProof {
    /// Creates a purchase proof with caller-chosen outputs.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidReference`] if the commitment has no txid.
    pub fn new(
        commitment: LedgerReference,
        contract: CrowdsaleContract,
        outputs: Vec<AssetOutput>,
    ) -> Result<Self, ContractError> {
        check_commitment(&commitment)?;
        Ok(Self {
            commitment,
            contract,
            outputs,
        })
    }

    /// Creates a purchase proof paying `tokens` of the sale token to
    /// `token_destination` and `change` of the change token to
    /// `change_destination`. A zero amount omits that output.
    ///
    /// # Errors
    ///
    /// - [`ContractError::InvalidReference`] if the commitment has no txid.
    /// - [`ContractError::InvalidTerms`] if both amounts are zero.
    pub fn for_entitlement(
        commitment: LedgerReference,
        contract: CrowdsaleContract,
        tokens: u64,
        token_destination: LedgerReference,
        change: u64,
        change_destination: LedgerReference,
    ) -> Result<Self, ContractError> {
        if tokens == 0 && change == 0 {
            return Err(ContractError::InvalidTerms {
                reason: "a purchase must claim tokens, change, or both".to_string(),
            });
        }
        let mut outputs = Vec::with_capacity(2);
        if tokens > 0 {
            outputs.push(AssetOutput::new(contract.token_id(), tokens, token_destination)?);
        }
        if change > 0 {
            outputs.push(AssetOutput::new(
                contract.change_token_id(),
                change,
                change_destination,
            )?);
        }
        Self::new(commitment, contract, outputs)
    }

    pub fn commitment(&self) -> &LedgerReference {
        &self.commitment
    }

    pub fn contract(&self) -> &CrowdsaleContract {
        &self.contract
    }

    pub fn outputs(&self) -> &[AssetOutput] {
        &self.outputs
    }
}

// ---------------------------------------------------------------------------
// Proof
// ---------------------------------------------------------------------------

/// Any proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Proof {
    Transfer(TransferProof),
    Issuance(IssuanceProof),
    CrowdsalePurchase(PurchaseProof),
}

impl Proof {
    /// Variant name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Proof::Transfer(_) => "transfer",
            Proof::Issuance(_) => "issuance",
            Proof::CrowdsalePurchase(_) => "crowdsale purchase",
        }
    }

    pub fn commitment(&self) -> &LedgerReference {
        match self {
            Proof::Transfer(p) => p.commitment(),
            Proof::Issuance(p) => p.commitment(),
            Proof::CrowdsalePurchase(p) => p.commitment(),
        }
    }

    /// Input proofs. Empty for issuance and purchase proofs.
    pub fn inputs(&self) -> &[Proof] {
        match self {
            Proof::Transfer(p) => p.inputs(),
            Proof::Issuance(_) | Proof::CrowdsalePurchase(_) => &[],
        }
    }

    pub fn outputs(&self) -> &[AssetOutput] {
        match self {
            Proof::Transfer(p) => p.outputs(),
            Proof::Issuance(p) => p.outputs(),
            Proof::CrowdsalePurchase(p) => p.outputs(),
        }
    }

    /// Records that the commitment was spent on the base ledger.
    ///
    /// For an issuance proof the commitment and the contract's issuance
    /// reference are the same seal, so both copies are marked.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadySpent`] if the commitment was already spent.
    pub fn spend_commitment(&mut self) -> Result<(), LedgerError> {
        match self {
            Proof::Transfer(p) => p.commitment.spend(),
            Proof::Issuance(p) => {
                p.commitment.spend()?;
                if !p.contract.verify() {
                    p.contract.spend_issuance()?;
                }
                Ok(())
            }
            Proof::CrowdsalePurchase(p) => p.commitment.spend(),
        }
    }

    /// Restores spent state across the whole proof tree from the holder's
    /// view of the base ledger. Every commitment, and the issuance seal of
    /// every embedded contract, that `is_spent` reports as spent is marked;
    /// seals already marked are left alone. Returns how many were marked.
    ///
    /// Decoded proofs arrive with every seal unspent, so a receiver calls
    /// this before verifying.
    pub fn mark_spent<F>(&mut self, is_spent: F) -> usize
    where
        F: Fn(&LedgerReference) -> bool,
    {
        let mark = |seal: &mut LedgerReference| {
            usize::from(!seal.is_spent() && is_spent(&*seal) && seal.spend().is_ok())
        };

        let mut marked = 0;
        let mut pending: Vec<&mut Proof> = vec![self];
        while let Some(proof) = pending.pop() {
            match proof {
                Proof::Transfer(p) => {
                    marked += mark(&mut p.commitment);
                    pending.extend(p.inputs.iter_mut());
                }
                Proof::Issuance(p) => {
                    marked += mark(&mut p.commitment);
                    if !p.contract.verify() && is_spent(p.contract.issuance_reference()) {
                        marked += usize::from(p.contract.spend_issuance().is_ok());
                    }
                }
                Proof::CrowdsalePurchase(p) => {
                    marked += mark(&mut p.commitment);
                    if !p.contract.verify() && is_spent(p.contract.issuance_reference()) {
                        marked += usize::from(p.contract.spend_issuance().is_ok());
                    }
                }
            }
        }
        marked
    }

    /// Verifies the proof against `chain` with default settings.
    pub fn verify(&self, chain: &ChainIndex) -> Result<VerificationReport, VerifyError> {
        Verifier::new(chain).verify(self)
    }

    /// Boolean form of [`verify`](Self::verify).
    pub fn is_valid(&self, chain: &ChainIndex) -> bool {
        self.verify(chain).is_ok()
    }
}

impl From<TransferProof> for Proof {
    fn from(proof: TransferProof) -> Self {
        Proof::Transfer(proof)
    }
}

impl From<IssuanceProof> for Proof {
    fn from(proof: IssuanceProof) -> Self {
        Proof::Issuance(proof)
    }
}

impl From<PurchaseProof> for Proof {
    fn from(proof: PurchaseProof) -> Self {
        Proof::CrowdsalePurchase(proof)
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} proof on {} ({} input(s), {} output(s))",
            self.kind(),
            self.commitment(),
            self.inputs().len(),
            self.outputs().len()
        )
    }
}
