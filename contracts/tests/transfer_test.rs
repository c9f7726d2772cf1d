//! Integration tests for issuance and transfer proofs.
//!
//! These tests build proof chains across module boundaries the way a holder
//! would receive them: an issuance, then one or more transfers, each
//! committed to a spent ledger reference.

use anyhow::Result;

use sealchain_contracts::{
    IssuanceProof, PlainContract, Proof, TransferProof, VerificationReport, Verifier,
    VerifierConfig, VerifyError,
};
use sealchain_protocol::{AssetOutput, ChainIndex, LedgerReference, TokenId};

/// Helper: a published 1000-unit contract issued on `asd:1` to `bcd:0`,
/// with its issuance proof.
fn issue() -> Result<(PlainContract, Proof)> {
    let mut issuance = LedgerReference::parse("asd:1")?;
    issuance.spend()?;
    let owner = LedgerReference::parse("bcd:0")?;
    let contract = PlainContract::new("Title", issuance.clone(), owner, 1000)?;
    let proof = IssuanceProof::new(issuance, contract.clone())?.into();
    Ok((contract, proof))
}

/// Helper: a spent reference to output 0 of `txid`.
fn spent(txid: &str) -> LedgerReference {
    let mut reference = LedgerReference::outpoint(txid, 0);
    reference.spend().expect("fresh reference");
    reference
}

fn output(token: TokenId, amount: u64, to: LedgerReference) -> AssetOutput {
    AssetOutput::new(token, amount, to).expect("positive amount")
}

// ---------------------------------------------------------------------------
// Happy Path
// ---------------------------------------------------------------------------

#[test]
fn owner_spends_full_issuance() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, issuance) = issue()?;

    let spend: Proof = TransferProof::new(
        spent("bcd"),
        vec![issuance],
        vec![output(contract.token_id(), 1000, LedgerReference::unknown(0))],
    )?
    .into();

    let report = spend.verify(&chain)?;
    assert_eq!(report, VerificationReport { proofs_checked: 2, depth: 1 });
    Ok(())
}

#[test]
fn split_then_merge_conserves_amounts() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, issuance) = issue()?;
    let token = contract.token_id();

    // bcd:0 splits 1000 into 700 for alice:0 and 300 for bob:0.
    let split: Proof = TransferProof::new(
        spent("bcd"),
        vec![issuance],
        vec![
            output(token, 700, LedgerReference::outpoint("alice", 0)),
            output(token, 300, LedgerReference::outpoint("bob", 0)),
        ],
    )?
    .into();

    // alice:0 forwards everything to carol:0.
    let forward: Proof = TransferProof::new(
        spent("alice"),
        vec![split.clone()],
        vec![output(token, 700, LedgerReference::outpoint("carol", 0))],
    )?
    .into();

    // bob:0 only sees his own 300; alice's 700 is addressed elsewhere.
    let bob: Proof = TransferProof::new(
        spent("bob"),
        vec![split],
        vec![
            output(token, 100, LedgerReference::outpoint("dave", 0)),
            output(token, 200, LedgerReference::outpoint("erin", 0)),
        ],
    )?
    .into();

    assert!(forward.is_valid(&chain));
    assert!(bob.is_valid(&chain));
    Ok(())
}

#[test]
fn verification_is_idempotent() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, issuance) = issue()?;
    let spend: Proof = TransferProof::new(
        spent("bcd"),
        vec![issuance],
        vec![output(contract.token_id(), 1000, LedgerReference::unknown(0))],
    )?
    .into();

    let first = spend.verify(&chain);
    let second = spend.verify(&chain);
    assert_eq!(first, second);
    assert!(first.is_ok());
    Ok(())
}

// ---------------------------------------------------------------------------
// Conservation
// ---------------------------------------------------------------------------

#[test]
fn creating_one_unit_is_rejected() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, issuance) = issue()?;

    let inflate: Proof = TransferProof::new(
        spent("bcd"),
        vec![issuance],
        vec![output(contract.token_id(), 1001, LedgerReference::unknown(0))],
    )?
    .into();

    match inflate.verify(&chain) {
        Err(VerifyError::AmountMismatch { expected, actual }) => {
            assert_eq!(expected[&contract.token_id()], 1000);
            assert_eq!(actual[&contract.token_id()], 1001);
        }
        other => panic!("expected amount mismatch, got {:?}", other),
    }
    Ok(())
}

#[test]
fn burning_one_unit_is_rejected() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, issuance) = issue()?;

    let burn: Proof = TransferProof::new(
        spent("bcd"),
        vec![issuance],
        vec![output(contract.token_id(), 999, LedgerReference::unknown(0))],
    )?
    .into();

    assert!(matches!(
        burn.verify(&chain),
        Err(VerifyError::AmountMismatch { .. })
    ));
    Ok(())
}

#[test]
fn assets_sent_elsewhere_cannot_be_claimed() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, issuance) = issue()?;

    // The issuance pays bcd:0; a transfer committed to xyz:0 receives nothing.
    let theft: Proof = TransferProof::new(
        spent("xyz"),
        vec![issuance],
        vec![output(contract.token_id(), 1000, LedgerReference::unknown(0))],
    )?
    .into();

    match theft.verify(&chain) {
        Err(VerifyError::AmountMismatch { expected, .. }) => assert!(expected.is_empty()),
        other => panic!("expected amount mismatch, got {:?}", other),
    }
    Ok(())
}

#[test]
fn empty_transfer_with_no_inputs_is_valid() -> Result<()> {
    let chain = ChainIndex::new();
    let proof: Proof = TransferProof::new(spent("nothing"), Vec::new(), Vec::new())?.into();
    assert!(proof.is_valid(&chain));
    Ok(())
}

// ---------------------------------------------------------------------------
// Spend Gating
// ---------------------------------------------------------------------------

#[test]
fn unspent_commitment_fails_until_spent() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, issuance) = issue()?;

    let mut spend: Proof = TransferProof::new(
        LedgerReference::outpoint("bcd", 0),
        vec![issuance],
        vec![output(contract.token_id(), 1000, LedgerReference::unknown(0))],
    )?
    .into();

    assert!(matches!(
        spend.verify(&chain),
        Err(VerifyError::UnspentCommitment { .. })
    ));

    spend.spend_commitment()?;
    assert!(spend.is_valid(&chain));
    Ok(())
}

#[test]
fn unpublished_contract_invalidates_descendants() -> Result<()> {
    let chain = ChainIndex::new();
    let issuance_ref = LedgerReference::outpoint("asd", 1);
    let contract = PlainContract::new(
        "Title",
        issuance_ref.clone(),
        LedgerReference::outpoint("bcd", 0),
        1000,
    )?;

    // The proof's commitment is spent but the contract's own copy of the
    // issuance seal was never marked, so the contract is unpublished.
    let mut commitment = issuance_ref;
    commitment.spend()?;
    let issuance: Proof = IssuanceProof::new(commitment, contract.clone())?.into();

    let spend: Proof = TransferProof::new(
        spent("bcd"),
        vec![issuance],
        vec![output(contract.token_id(), 1000, LedgerReference::unknown(0))],
    )?
    .into();

    let err = spend.verify(&chain).unwrap_err();
    assert!(matches!(err, VerifyError::InvalidInput { .. }));
    assert!(matches!(
        err.root_cause(),
        VerifyError::UncommittedContract { .. }
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// Issuance Exactness
// ---------------------------------------------------------------------------

#[test]
fn tampered_issuance_outputs_are_rejected() -> Result<()> {
    let chain = ChainIndex::new();
    let (contract, _) = issue()?;
    let token = contract.token_id();
    let owner = contract.owner_reference().clone();

    let tampered = [
        vec![output(token, 1001, owner.clone())],
        vec![output(token, 999, owner.clone())],
        vec![output(token, 1000, LedgerReference::outpoint("bcd", 1))],
        vec![output(token, 500, owner.clone()), output(token, 500, owner.clone())],
        Vec::new(),
    ];

    for outputs in tampered {
        let mut wire = sealchain_contracts::codec::WireProof::from_proof(
            &IssuanceProof::new(contract.issuance_reference().clone(), contract.clone())?.into(),
            Default::default(),
        );
        wire.nodes[0].outputs = outputs.iter().map(Into::into).collect();
        let mut proof = Proof::try_from(wire)?;
        proof.spend_commitment()?;

        assert!(matches!(
            proof.verify(&chain),
            Err(VerifyError::IssuanceOutputMismatch { .. })
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parallel Verification
// ---------------------------------------------------------------------------

#[test]
fn parallel_and_sequential_agree() -> Result<()> {
    let chain = ChainIndex::new();
    let mut inputs: Vec<Proof> = Vec::new();
    let mut outputs = Vec::new();

    // Eight independent issuances all paying the same holder.
    for i in 0..8u32 {
        let mut seal = LedgerReference::outpoint(format!("seal{}", i), i);
        seal.spend()?;
        let contract = PlainContract::new(
            format!("Token {}", i),
            seal.clone(),
            LedgerReference::outpoint("holder", 0),
            100 + u64::from(i),
        )?;
        outputs.push(output(
            contract.token_id(),
            contract.total_supply(),
            LedgerReference::unknown(i),
        ));
        inputs.push(IssuanceProof::new(seal, contract)?.into());
    }

    let good: Proof = TransferProof::new(spent("holder"), inputs.clone(), outputs.clone())?.into();

    // Poison the sixth input by leaving its commitment unspent.
    let mut poisoned_inputs = inputs;
    let poisoned_seal = LedgerReference::outpoint("seal5", 5);
    if let Proof::Issuance(p) = &poisoned_inputs[5] {
        let contract = p.contract().clone();
        poisoned_inputs[5] = IssuanceProof::new(poisoned_seal, contract)?.into();
    }
    let bad: Proof = TransferProof::new(spent("holder"), poisoned_inputs, outputs)?.into();

    let parallel = Verifier::with_config(
        &chain,
        VerifierConfig {
            parallel_min_inputs: 2,
            ..VerifierConfig::default()
        },
    );
    let sequential = Verifier::with_config(&chain, VerifierConfig::sequential());

    assert_eq!(parallel.verify(&good), sequential.verify(&good));
    assert_eq!(parallel.verify(&good)?.proofs_checked, 9);

    let par_err = parallel.verify(&bad).unwrap_err();
    let seq_err = sequential.verify(&bad).unwrap_err();
    assert_eq!(par_err, seq_err);
    match par_err {
        VerifyError::InvalidInput { child, source } => {
            assert_eq!(child, LedgerReference::outpoint("seal5", 5));
            assert!(matches!(*source, VerifyError::UnspentCommitment { .. }));
        }
        other => panic!("expected invalid input, got {:?}", other),
    }
    Ok(())
}
