//! # Proof Verification
//!
//! Checks a proof graph from the proof being verified back to the issuances
//! and crowdsale purchases it ultimately rests on. The base ledger is only
//! ever read.
//!
//! ## Transfer
//!
//! 1. The commitment must be spent.
//! 2. Every input proof must verify.
//! 3. For every token, the amounts inputs send to this commitment must
//!    equal the amounts this proof's outputs allocate.
//!
//! ## Issuance
//!
//! The commitment must be spent and be the contract's issuance reference,
//! the contract must be published, and the outputs must be exactly one
//! allocation of the total supply to the owner.
//!
//! ## Crowdsale purchase
//!
//! The commitment must be spent and its transaction must be a deposit in
//! the sale window. The outputs must carry exactly the buyer's entitlement
//! (see [`crate::crowdsale`]): the token amount in the sale token and the
//! change in the change token, nothing else.
//!
//! ## Walk
//!
//! The graph is never walked by recursion. It is first laid out
//! breadth-first in a table, stopping at nodes that fail the depth bound,
//! the cycle check or the spent check. Every node's own checks are
//! independent of the others and run on the rayon pool when the table is
//! large enough. Outcomes are then resolved back to front, children before
//! parents, reporting for each node the first failure in input order, so
//! the result matches a depth-first check and does not depend on
//! scheduling.

use std::env;
use std::ops::Range;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use sealchain_protocol::asset::{accumulate, tally, TokenTotals};
use sealchain_protocol::config::{
    parse_flag, DEFAULT_MAX_PROOF_DEPTH, DEFAULT_PARALLEL_MIN_INPUTS, ENV_MAX_PROOF_DEPTH,
    ENV_PARALLEL_VERIFY,
};
use sealchain_protocol::ledger::ChainIndex;

use crate::crowdsale::resolve_purchase;
use crate::error::VerifyError;
use crate::proof::{IssuanceProof, Proof, PurchaseProof, TransferProof};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Verifier settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Deepest proof level accepted below the root.
    pub max_depth: usize,
    /// Whether proof checks may run in parallel.
    pub parallel: bool,
    /// Fewest proofs below the root worth fanning out.
    pub parallel_min_inputs: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_PROOF_DEPTH,
            parallel: true,
            parallel_min_inputs: DEFAULT_PARALLEL_MIN_INPUTS,
        }
    }
}

impl VerifierConfig {
    /// Defaults overridden by `SEALCHAIN_MAX_PROOF_DEPTH` and
    /// `SEALCHAIN_PARALLEL_VERIFY`. Unparseable values are logged and
    /// ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var(ENV_MAX_PROOF_DEPTH) {
            match raw.trim().parse::<usize>() {
                Ok(depth) => config.max_depth = depth,
                Err(e) => warn!(
                    "ignoring {}={:?}: {}; using {}",
                    ENV_MAX_PROOF_DEPTH, raw, e, config.max_depth
                ),
            }
        }

        if let Ok(raw) = env::var(ENV_PARALLEL_VERIFY) {
            match parse_flag(&raw) {
                Some(flag) => config.parallel = flag,
                None => warn!(
                    "ignoring {}={:?}: expected a boolean; using {}",
                    ENV_PARALLEL_VERIFY, raw, config.parallel
                ),
            }
        }

        config
    }

    /// Strictly sequential verification.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Summary of a successful verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Proof nodes checked, counting a proof reachable along several paths
    /// once per path.
    pub proofs_checked: usize,
    /// Deepest level reached below the root.
    pub depth: usize,
}

impl VerificationReport {
    fn leaf(depth: usize) -> Self {
        Self {
            proofs_checked: 1,
            depth,
        }
    }

    fn absorb(&mut self, child: VerificationReport) {
        self.proofs_checked += child.proofs_checked;
        self.depth = self.depth.max(child.depth);
    }
}

// ---------------------------------------------------------------------------
// Proof table
// ---------------------------------------------------------------------------

type Outcome = Result<VerificationReport, VerifyError>;

/// A proof reached from the root. Inputs always sit further down the table
/// than the proof that spends them.
struct Node<'p> {
    proof: &'p Proof,
    parent: Option<usize>,
    depth: usize,
    /// Table slots of the inputs, in input order. Empty when the node failed
    /// its gate and was not expanded.
    inputs: Range<usize>,
    /// Failure found before the inputs are looked at.
    gate: Option<VerifyError>,
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Checks proofs against a read-only chain index.
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    chain: &'a ChainIndex,
    config: VerifierConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(chain: &'a ChainIndex) -> Self {
        Self::with_config(chain, VerifierConfig::default())
    }

    pub fn with_config(chain: &'a ChainIndex, config: VerifierConfig) -> Self {
        Self { chain, config }
    }

    /// Verifier configured from the environment.
    pub fn from_env(chain: &'a ChainIndex) -> Self {
        Self::with_config(chain, VerifierConfig::from_env())
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verifies `proof` and everything it rests on.
    ///
    /// # Errors
    ///
    /// The first [`VerifyError`] found. Failures below the root arrive
    /// wrapped in [`VerifyError::InvalidInput`], one layer per level.
    pub fn verify(&self, proof: &Proof) -> Result<VerificationReport, VerifyError> {
        let result = self.verify_table(proof);
        match &result {
            Ok(report) => info!(
                commitment = %proof.commitment(),
                kind = proof.kind(),
                proofs = report.proofs_checked,
                depth = report.depth,
                "proof verified"
            ),
            Err(e) => info!(
                commitment = %proof.commitment(),
                kind = proof.kind(),
                error = %e.root_cause(),
                "proof rejected"
            ),
        }
        result
    }

    /// Boolean form of [`verify`](Self::verify).
    pub fn is_valid(&self, proof: &Proof) -> bool {
        self.verify(proof).is_ok()
    }

    fn verify_table(&self, root: &Proof) -> Outcome {
        let nodes = self.lay_out(root);

        let checks: Vec<Result<(), VerifyError>> =
            if self.config.parallel && nodes.len() > self.config.parallel_min_inputs.max(2) {
                nodes.par_iter().map(|node| self.check_node(node)).collect()
            } else {
                nodes.iter().map(|node| self.check_node(node)).collect()
            };

        let mut outcomes: Vec<Option<Outcome>> = Vec::new();
        outcomes.resize_with(nodes.len(), || None);
        for index in (1..nodes.len()).rev() {
            let outcome = self.resolve(&nodes[index], &checks[index], &mut outcomes);
            outcomes[index] = Some(outcome);
        }
        self.resolve(&nodes[0], &checks[0], &mut outcomes)
    }

    /// Lays the graph out breadth-first. A node that fails its gate is kept
    /// but its inputs are not visited.
    fn lay_out<'p>(&self, root: &'p Proof) -> Vec<Node<'p>> {
        let mut nodes = vec![Node {
            proof: root,
            parent: None,
            depth: 0,
            inputs: 0..0,
            gate: None,
        }];

        let mut index = 0;
        while index < nodes.len() {
            let gate = self.gate(&nodes, index);
            let (proof, depth) = (nodes[index].proof, nodes[index].depth);
            let first = nodes.len();
            if gate.is_none() {
                nodes.extend(proof.inputs().iter().map(|input| Node {
                    proof: input,
                    parent: Some(index),
                    depth: depth + 1,
                    inputs: 0..0,
                    gate: None,
                }));
            }
            let last = nodes.len();
            let node = &mut nodes[index];
            node.inputs = first..last;
            node.gate = gate;
            index += 1;
        }
        nodes
    }

    /// Checks that decide whether a node's inputs are worth visiting: the
    /// depth bound, a repeated commitment on the path from the root, and a
    /// transfer's own commitment being spent.
    fn gate(&self, nodes: &[Node<'_>], index: usize) -> Option<VerifyError> {
        let node = &nodes[index];
        if node.depth > self.config.max_depth {
            return Some(VerifyError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }

        let commitment = node.proof.commitment();
        let mut ancestor = node.parent;
        while let Some(i) = ancestor {
            if nodes[i].proof.commitment() == commitment {
                return Some(VerifyError::CycleDetected {
                    commitment: commitment.clone(),
                });
            }
            ancestor = nodes[i].parent;
        }

        match node.proof {
            Proof::Transfer(_) if !commitment.is_spent() => Some(VerifyError::UnspentCommitment {
                commitment: commitment.clone(),
            }),
            _ => None,
        }
    }

    /// A node's own checks, independent of how its inputs fared.
    fn check_node(&self, node: &Node<'_>) -> Result<(), VerifyError> {
        if node.gate.is_some() {
            return Ok(());
        }
        match node.proof {
            Proof::Transfer(p) => self.check_conservation(p),
            Proof::Issuance(p) => self.verify_issuance(p),
            Proof::CrowdsalePurchase(p) => self.verify_purchase(p),
        }
    }

    /// Combines a node's gate, its inputs' outcomes and its own check, in
    /// that order. The inputs' outcomes are taken out of `outcomes`.
    fn resolve(
        &self,
        node: &Node<'_>,
        check: &Result<(), VerifyError>,
        outcomes: &mut [Option<Outcome>],
    ) -> Outcome {
        if let Some(gate) = &node.gate {
            return Err(gate.clone());
        }

        let mut report = VerificationReport::leaf(node.depth);
        for (input, slot) in node.proof.inputs().iter().zip(node.inputs.clone()) {
            if let Some(outcome) = outcomes[slot].take() {
                report.absorb(outcome.map_err(|e| VerifyError::InvalidInput {
                    child: input.commitment().clone(),
                    source: Box::new(e),
                })?);
            }
        }
        check.clone()?;

        debug!(
            commitment = %node.proof.commitment(),
            kind = node.proof.kind(),
            depth = node.depth,
            inputs = node.inputs.len(),
            "proof node verified"
        );
        Ok(report)
    }

    /// Per token, what the inputs sent to this commitment must equal what
    /// the outputs allocate.
    fn check_conservation(&self, proof: &TransferProof) -> Result<(), VerifyError> {
        let commitment = proof.commitment();
        let mut received = TokenTotals::new();
        for output in proof.inputs().iter().flat_map(Proof::outputs) {
            if output.destination() == commitment {
                accumulate(&mut received, output.token_id(), output.amount());
            }
        }
        let allocated = tally(proof.outputs());
        if received != allocated {
            return Err(VerifyError::AmountMismatch {
                expected: received,
                actual: allocated,
            });
        }
        Ok(())
    }

    fn verify_issuance(&self, proof: &IssuanceProof) -> Result<(), VerifyError> {
        let commitment = proof.commitment();
        let contract = proof.contract();
        if !commitment.is_spent() {
            return Err(VerifyError::UnspentCommitment {
                commitment: commitment.clone(),
            });
        }
        if contract.issuance_reference() != commitment {
            return Err(VerifyError::IssuanceMismatch {
                commitment: commitment.clone(),
                issuance: contract.issuance_reference().clone(),
            });
        }
        if !contract.verify() {
            return Err(VerifyError::UncommittedContract {
                issuance: contract.issuance_reference().clone(),
            });
        }

        let token_id = contract.token_id();
        let exact = match proof.outputs() {
            [output] => {
                output.token_id() == token_id
                    && output.amount() == contract.total_supply()
                    && output.destination() == contract.owner_reference()
            }
            _ => false,
        };
        if !exact {
            return Err(VerifyError::IssuanceOutputMismatch {
                token_id,
                total_supply: contract.total_supply(),
                owner: contract.owner_reference().clone(),
                actual: proof.outputs().to_vec(),
            });
        }
        Ok(())
    }

    fn verify_purchase(&self, proof: &PurchaseProof) -> Result<(), VerifyError> {
        let commitment = proof.commitment();
        let contract = proof.contract();
        if !commitment.is_spent() {
            return Err(VerifyError::UnspentCommitment {
                commitment: commitment.clone(),
            });
        }

        let record = resolve_purchase(contract, self.chain, commitment)?;
        let entitled = record.purchase;
        if entitled.is_empty() {
            return Err(VerifyError::NoEntitlement {
                commitment: commitment.clone(),
            });
        }

        let token_id = contract.token_id();
        let change_id = contract.change_token_id();
        let mut allocated = TokenTotals::new();
        for output in proof.outputs() {
            if output.token_id() != token_id && output.token_id() != change_id {
                return Err(VerifyError::UnrecognizedOutput {
                    output: output.clone(),
                });
            }
            accumulate(&mut allocated, output.token_id(), output.amount());
        }

        if entitled.tokens > 0 && !allocated.contains_key(&token_id) {
            return Err(VerifyError::MissingTokenOutput {
                commitment: commitment.clone(),
            });
        }
        if entitled.change > 0 && !allocated.contains_key(&change_id) {
            return Err(VerifyError::MissingChangeOutput {
                commitment: commitment.clone(),
            });
        }

        // Claiming tokens or change beyond the entitlement is rejected too,
        // including claims of a kind the buyer is owed none of.
        let mut expected = TokenTotals::new();
        if entitled.tokens > 0 {
            accumulate(&mut expected, token_id, entitled.tokens);
        }
        if entitled.change > 0 {
            accumulate(&mut expected, change_id, entitled.change);
        }
        if expected != allocated {
            return Err(VerifyError::AmountMismatch {
                expected,
                actual: allocated,
            });
        }

        if !contract.verify() {
            return Err(VerifyError::UncommittedContract {
                issuance: contract.issuance_reference().clone(),
            });
        }

        // A stale height on the commitment wins over the index position.
        let height = commitment
            .block_height()
            .unwrap_or(record.position.height);
        if !contract.covers(height) {
            return Err(VerifyError::OutsideSaleWindow {
                height,
                from_height: contract.from_height(),
                to_height: contract.to_height(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::PlainContract;
    use sealchain_protocol::asset::AssetOutput;
    use sealchain_protocol::ledger::LedgerReference;

    fn issued() -> Proof {
        let mut issuance = LedgerReference::outpoint("asd", 1);
        issuance.spend().unwrap();
        let contract = PlainContract::new(
            "Test Contract",
            issuance.clone(),
            LedgerReference::outpoint("bcd", 0),
            1000,
        )
        .unwrap();
        IssuanceProof::new(issuance, contract).unwrap().into()
    }

    fn transfer(commitment: &str, inputs: Vec<Proof>, outputs: Vec<AssetOutput>) -> Proof {
        let mut commitment = LedgerReference::outpoint(commitment, 0);
        commitment.spend().unwrap();
        TransferProof::new(commitment, inputs, outputs).unwrap().into()
    }

    /// An issuance followed by `hops` full-balance transfers.
    fn chain_of(hops: usize) -> Proof {
        let mut proof = issued();
        let token = proof.outputs()[0].token_id();
        let mut holder = "bcd".to_string();
        for hop in 0..hops {
            let next = format!("h{}", hop);
            let output = AssetOutput::new(token, 1000, LedgerReference::outpoint(next.as_str(), 0));
            proof = transfer(&holder, vec![proof], vec![output.unwrap()]);
            holder = next;
        }
        proof
    }

    fn issued_on(seal: &str, spent: bool) -> Proof {
        let mut issuance = LedgerReference::outpoint(seal, 0);
        if spent {
            issuance.spend().unwrap();
        }
        let contract = PlainContract::new(
            seal,
            issuance.clone(),
            LedgerReference::outpoint("holder", 0),
            10,
        )
        .unwrap();
        IssuanceProof::new(issuance, contract).unwrap().into()
    }

    #[test]
    fn default_config_is_parallel() {
        let config = VerifierConfig::default();
        assert!(config.parallel);
        assert_eq!(config.max_depth, DEFAULT_MAX_PROOF_DEPTH);
        assert!(!VerifierConfig::sequential().parallel);
    }

    #[test]
    fn issuance_verifies_as_leaf() {
        let chain = ChainIndex::new();
        let report = Verifier::new(&chain).verify(&issued()).unwrap();
        assert_eq!(report, VerificationReport { proofs_checked: 1, depth: 0 });
    }

    #[test]
    fn depth_limit_enforced() {
        let chain = ChainIndex::new();
        let issuance = issued();
        let token = issuance.outputs()[0].token_id();
        // Owner "bcd:0" spends everything into "t0:0", which spends into "t1:0".
        let hop1 = transfer(
            "bcd",
            vec![issuance],
            vec![AssetOutput::new(token, 1000, LedgerReference::outpoint("t0", 0)).unwrap()],
        );
        let hop2 = transfer(
            "t0",
            vec![hop1],
            vec![AssetOutput::new(token, 1000, LedgerReference::outpoint("t1", 0)).unwrap()],
        );

        let strict = VerifierConfig {
            max_depth: 1,
            ..VerifierConfig::sequential()
        };
        let err = Verifier::with_config(&chain, strict).verify(&hop2).unwrap_err();
        assert_eq!(err.root_cause(), &VerifyError::DepthExceeded { limit: 1 });

        let report = Verifier::new(&chain).verify(&hop2).unwrap();
        assert_eq!(report, VerificationReport { proofs_checked: 3, depth: 2 });
    }

    #[test]
    fn repeated_commitment_on_path_is_a_cycle() {
        let chain = ChainIndex::new();
        let issuance = issued();
        let token = issuance.outputs()[0].token_id();
        let inner = transfer(
            "bcd",
            vec![issuance],
            vec![AssetOutput::new(token, 1000, LedgerReference::outpoint("bcd", 0)).unwrap()],
        );
        let outer = transfer(
            "bcd",
            vec![inner],
            vec![AssetOutput::new(token, 1000, LedgerReference::outpoint("x", 0)).unwrap()],
        );
        let err = Verifier::new(&chain).verify(&outer).unwrap_err();
        assert!(matches!(err.root_cause(), VerifyError::CycleDetected { .. }));
    }

    #[test]
    fn chain_at_the_default_bound_verifies() {
        let chain = ChainIndex::new();
        let proof = chain_of(DEFAULT_MAX_PROOF_DEPTH);

        let report = Verifier::new(&chain).verify(&proof).unwrap();
        assert_eq!(report.depth, DEFAULT_MAX_PROOF_DEPTH);
        assert_eq!(report.proofs_checked, DEFAULT_MAX_PROOF_DEPTH + 1);
        let sequential = Verifier::with_config(&chain, VerifierConfig::sequential());
        assert_eq!(sequential.verify(&proof), Ok(report));

        let deeper = chain_of(DEFAULT_MAX_PROOF_DEPTH + 1);
        let err = Verifier::new(&chain).verify(&deeper).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &VerifyError::DepthExceeded {
                limit: DEFAULT_MAX_PROOF_DEPTH
            }
        );
    }

    #[test]
    fn first_failing_input_in_order_is_reported() {
        let chain = ChainIndex::new();
        let inputs = vec![
            issued_on("s0", true),
            issued_on("s1", false),
            issued_on("s2", true),
            issued_on("s3", false),
        ];
        let outputs = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                AssetOutput::new(input.outputs()[0].token_id(), 10, LedgerReference::unknown(i as u32))
                    .unwrap()
            })
            .collect();
        let merge = transfer("holder", inputs, outputs);

        let fan_out = VerifierConfig {
            parallel_min_inputs: 2,
            ..VerifierConfig::default()
        };
        for config in [fan_out, VerifierConfig::sequential()] {
            match Verifier::with_config(&chain, config).verify(&merge) {
                Err(VerifyError::InvalidInput { child, source }) => {
                    assert_eq!(child, LedgerReference::outpoint("s1", 0));
                    assert!(matches!(*source, VerifyError::UnspentCommitment { .. }));
                }
                other => panic!("expected invalid input, got {:?}", other),
            }
        }
    }

    #[test]
    fn unspent_transfer_is_not_expanded() {
        let chain = ChainIndex::new();
        let issuance = issued();
        let token = issuance.outputs()[0].token_id();
        let proof: Proof = TransferProof::new(
            LedgerReference::outpoint("bcd", 0),
            vec![issuance],
            vec![AssetOutput::new(token, 1000, LedgerReference::unknown(0)).unwrap()],
        )
        .unwrap()
        .into();

        let verifier = Verifier::new(&chain);
        let nodes = verifier.lay_out(&proof);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].inputs.is_empty());
        assert!(matches!(
            verifier.verify(&proof),
            Err(VerifyError::UnspentCommitment { .. })
        ));
    }
}
