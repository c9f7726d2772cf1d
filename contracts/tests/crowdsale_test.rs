//! Integration tests for crowdsale purchases.
//!
//! The base scenario: a 1000-token sale at 10 units per token runs from
//! height 10 to 15. In block 12 someone pays 9990 (999 tokens), then the
//! buyer under test pays 20 and gets the last token plus 10 in change.

use anyhow::Result;

use sealchain_contracts::{
    sale_ledger, CrowdsaleContract, Proof, Purchase, PurchaseProof, TransferProof, VerifyError,
};
use sealchain_protocol::{AssetOutput, Block, ChainIndex, LedgerReference, Transaction, Txid};

const SALE: &str = "crowdsaleaddr";

/// Helper: the published sale contract.
fn contract() -> Result<CrowdsaleContract> {
    let mut issuance = LedgerReference::parse("asd:1")?;
    issuance.spend()?;
    Ok(CrowdsaleContract::new("Title", issuance, 1000, 10, 10, 15, SALE)?)
}

/// Helper: a chain with both purchases confirmed in block 12.
fn chain() -> Result<ChainIndex> {
    let someone = Transaction::new("someonebuys", [("lll", 1), (SALE, 9990)])?;
    let buyer = Transaction::new("buytx", [("abc", 1), (SALE, 20)])?;
    Ok(ChainIndex::from_blocks([Block::new(12, vec![someone, buyer])?])?)
}

/// Helper: spent output 0 of a confirmed transaction.
fn commitment(chain: &ChainIndex, txid: &str) -> Result<LedgerReference> {
    let tx = chain
        .transaction(&Txid::new(txid))
        .ok_or_else(|| anyhow::anyhow!("{} not indexed", txid))?;
    let mut reference = tx.output(0)?;
    reference.spend()?;
    Ok(reference)
}

fn purchase(
    chain: &ChainIndex,
    txid: &str,
    tokens: u64,
    change: u64,
) -> Result<Proof> {
    Ok(PurchaseProof::for_entitlement(
        commitment(chain, txid)?,
        contract()?,
        tokens,
        LedgerReference::outpoint("fff", 1),
        change,
        LedgerReference::outpoint("ffb", 0),
    )?
    .into())
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[test]
fn last_token_and_change_then_transfer() -> Result<()> {
    let chain = chain()?;
    let contract = contract()?;
    let buy = purchase(&chain, "buytx", 1, 10)?;
    assert!(buy.is_valid(&chain));

    let mut owner = LedgerReference::outpoint("fff", 1);
    owner.spend()?;
    let spend: Proof = TransferProof::new(
        owner,
        vec![buy],
        vec![AssetOutput::new(contract.token_id(), 1, LedgerReference::unknown(0))?],
    )?
    .into();

    let report = spend.verify(&chain)?;
    assert_eq!(report.proofs_checked, 2);
    Ok(())
}

#[test]
fn earlier_buyer_gets_exact_allocation() -> Result<()> {
    let chain = chain()?;
    assert!(purchase(&chain, "someonebuys", 999, 0)?.is_valid(&chain));
    Ok(())
}

#[test]
fn sale_ledger_reports_every_buyer() -> Result<()> {
    let ledger = sale_ledger(&contract()?, &chain()?)?;
    assert_eq!(ledger.records.len(), 2);
    assert_eq!(ledger.records[0].purchase, Purchase { tokens: 999, change: 0 });
    assert_eq!(
        ledger.record(&Txid::new("buytx")).map(|r| r.purchase),
        Some(Purchase { tokens: 1, change: 10 })
    );
    assert_eq!(ledger.remaining, 0);
    Ok(())
}

// ---------------------------------------------------------------------------
// Entitlement Mismatches
// ---------------------------------------------------------------------------

#[test]
fn claiming_an_extra_token_is_rejected() -> Result<()> {
    let chain = chain()?;
    assert!(matches!(
        purchase(&chain, "buytx", 2, 10)?.verify(&chain),
        Err(VerifyError::AmountMismatch { .. })
    ));
    Ok(())
}

#[test]
fn dropping_the_change_output_is_rejected() -> Result<()> {
    let chain = chain()?;
    assert!(matches!(
        purchase(&chain, "buytx", 1, 0)?.verify(&chain),
        Err(VerifyError::MissingChangeOutput { .. })
    ));
    Ok(())
}

#[test]
fn dropping_the_token_output_is_rejected() -> Result<()> {
    let chain = chain()?;
    assert!(matches!(
        purchase(&chain, "buytx", 0, 10)?.verify(&chain),
        Err(VerifyError::MissingTokenOutput { .. })
    ));
    Ok(())
}

#[test]
fn claiming_change_not_owed_is_rejected() -> Result<()> {
    let chain = chain()?;
    assert!(matches!(
        purchase(&chain, "someonebuys", 999, 5)?.verify(&chain),
        Err(VerifyError::AmountMismatch { .. })
    ));
    Ok(())
}

#[test]
fn foreign_token_output_is_rejected() -> Result<()> {
    let chain = chain()?;
    let sale = contract()?;
    let stray = CrowdsaleContract::new(
        "Other",
        LedgerReference::outpoint("zzz", 0),
        10,
        1,
        10,
        15,
        SALE,
    )?;
    let proof: Proof = PurchaseProof::new(
        commitment(&chain, "buytx")?,
        sale.clone(),
        vec![
            AssetOutput::new(sale.token_id(), 1, LedgerReference::outpoint("fff", 1))?,
            AssetOutput::new(sale.change_token_id(), 10, LedgerReference::outpoint("ffb", 0))?,
            AssetOutput::new(stray.token_id(), 1, LedgerReference::outpoint("fff", 1))?,
        ],
    )?
    .into();

    assert!(matches!(
        proof.verify(&chain),
        Err(VerifyError::UnrecognizedOutput { .. })
    ));
    Ok(())
}

#[test]
fn buyer_after_sellout_with_exact_payment_gets_refund_only() -> Result<()> {
    let sold_out = Transaction::new("whale", [("w", 1), (SALE, 10_000)])?;
    let late = Transaction::new("late", [("l", 1), (SALE, 30)])?;
    let chain = ChainIndex::from_blocks([
        Block::new(11, vec![sold_out])?,
        Block::new(13, vec![late])?,
    ])?;

    assert!(purchase(&chain, "late", 0, 30)?.is_valid(&chain));
    assert!(purchase(&chain, "whale", 1000, 0)?.is_valid(&chain));
    Ok(())
}

#[test]
fn underpayment_is_refunded_as_change() -> Result<()> {
    let tiny = Transaction::new("tiny", [("t", 1), (SALE, 1)])?;
    let chain = ChainIndex::from_blocks([Block::new(12, vec![tiny])?])?;

    // Less than one token's price: no tokens, the single unit comes back.
    assert!(purchase(&chain, "tiny", 0, 1)?.is_valid(&chain));

    let empty: Proof =
        PurchaseProof::new(commitment(&chain, "tiny")?, contract()?, Vec::new())?.into();
    assert!(matches!(
        empty.verify(&chain),
        Err(VerifyError::MissingChangeOutput { .. })
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// Chain Lookups
// ---------------------------------------------------------------------------

#[test]
fn malformed_deposits_poison_the_sale() -> Result<()> {
    for malformed in [
        Transaction::new("odd", [(SALE, 100)])?,
        Transaction::new("odd", [("a", 1), ("b", 1), (SALE, 100)])?,
    ] {
        let buyer = Transaction::new("buytx", [("abc", 1), (SALE, 20)])?;
        let chain = ChainIndex::from_blocks([
            Block::new(11, vec![malformed])?,
            Block::new(12, vec![buyer])?,
        ])?;
        let proof = purchase(&chain, "buytx", 2, 0)?;
        assert!(matches!(
            proof.verify(&chain),
            Err(VerifyError::MalformedPurchase { .. })
        ));
    }
    Ok(())
}

#[test]
fn purchase_outside_window_is_not_found() -> Result<()> {
    let buyer = Transaction::new("buytx", [("abc", 1), (SALE, 20)])?;
    let chain = ChainIndex::from_blocks([Block::new(16, vec![buyer])?])?;
    assert!(matches!(
        purchase(&chain, "buytx", 2, 0)?.verify(&chain),
        Err(VerifyError::PurchaseNotFound { .. })
    ));
    Ok(())
}

#[test]
fn stale_commitment_height_is_outside_window() -> Result<()> {
    let chain = chain()?;
    // The same transaction as seen in a block at height 20 on another view
    // of the chain.
    let fork = Block::new(20, vec![Transaction::new("buytx", [("abc", 1), (SALE, 20)])?])?;
    let mut stale = fork.transactions()[0].output(0)?;
    assert_eq!(stale.block_height(), Some(20));
    stale.spend()?;

    let proof: Proof = PurchaseProof::for_entitlement(
        stale,
        contract()?,
        1,
        LedgerReference::outpoint("fff", 1),
        10,
        LedgerReference::outpoint("ffb", 0),
    )?
    .into();

    assert_eq!(
        proof.verify(&chain),
        Err(VerifyError::OutsideSaleWindow {
            height: 20,
            from_height: 10,
            to_height: 15
        })
    );
    Ok(())
}

#[test]
fn unpublished_sale_is_rejected() -> Result<()> {
    let chain = chain()?;
    let unpublished = CrowdsaleContract::new(
        "Title",
        LedgerReference::outpoint("asd", 1),
        1000,
        10,
        10,
        15,
        SALE,
    )?;
    let proof: Proof = PurchaseProof::for_entitlement(
        commitment(&chain, "buytx")?,
        unpublished,
        1,
        LedgerReference::outpoint("fff", 1),
        10,
        LedgerReference::outpoint("ffb", 0),
    )?
    .into();

    assert!(matches!(
        proof.verify(&chain),
        Err(VerifyError::UncommittedContract { .. })
    ));
    Ok(())
}

#[test]
fn unspent_purchase_commitment_is_rejected() -> Result<()> {
    let chain = chain()?;
    let tx = chain
        .transaction(&Txid::new("buytx"))
        .ok_or_else(|| anyhow::anyhow!("buytx not indexed"))?;
    let proof: Proof = PurchaseProof::for_entitlement(
        tx.output(0)?,
        contract()?,
        1,
        LedgerReference::outpoint("fff", 1),
        10,
        LedgerReference::outpoint("ffb", 0),
    )?
    .into();

    assert!(matches!(
        proof.verify(&chain),
        Err(VerifyError::UnspentCommitment { .. })
    ));
    Ok(())
}
