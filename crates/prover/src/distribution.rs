//! Distribution builder: turns an entitlement snapshot into a committed tree.
//!
//! Records are deduplicated by identity, validated, sorted by identity and
//! hashed into leaves, so any ordering of the same logical set yields the
//! same root and the same proofs. Every proof is checked against the root
//! before the distribution is handed out.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dropcraft_core::{Digest, Identity};

use crate::merkle::{MerkleProof, MerkleTree};
use crate::traits::LeafRecord;
use crate::{ProverError, Result};

/// What to do when the input lists the same identity twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the whole build
    #[default]
    Reject,
    /// Later records replace earlier ones
    LastWins,
}

/// Builds distributions under a fixed duplicate policy.
#[derive(Debug, Clone, Default)]
pub struct DistributionBuilder {
    policy: DuplicatePolicy,
}

impl DistributionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Build a distribution from an owned snapshot of records.
    pub fn build<R: LeafRecord>(&self, records: Vec<R>) -> Result<Distribution<R>> {
        if records.is_empty() {
            return Err(ProverError::EmptyDistribution);
        }
        let input_len = records.len();

        // BTreeMap gives identity order and dedup in one pass
        let mut by_identity: BTreeMap<Identity, R> = BTreeMap::new();
        for record in records {
            let identity = *record.identity();
            if let Some(previous) = by_identity.insert(identity, record) {
                match self.policy {
                    DuplicatePolicy::Reject => {
                        return Err(ProverError::DuplicateIdentity(hex::encode(identity)));
                    }
                    DuplicatePolicy::LastWins => {
                        debug!(
                            "Replacing duplicate record for {} (previous weight {})",
                            hex::encode(&identity[..8]),
                            previous.weight(),
                        );
                    }
                }
            }
        }

        let mut total: u64 = 0;
        for record in by_identity.values() {
            record.validate()?;
            total = total
                .checked_add(record.weight())
                .ok_or(ProverError::AmountOverflow)?;
        }

        let entries: Vec<R> = by_identity.into_values().collect();
        let leaves: Vec<Digest> = entries.iter().map(LeafRecord::leaf).collect();
        let tree = MerkleTree::from_leaves(leaves)?;
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, record)| (*record.identity(), i))
            .collect();

        let distribution = Distribution {
            root: tree.root(),
            total,
            entries,
            tree,
            index,
        };
        distribution.self_check()?;

        info!(
            "Built distribution: root={}, entries={} (input {}), total={}, depth={}",
            hex::encode(&distribution.root[..8]),
            distribution.len(),
            input_len,
            total,
            distribution.depth(),
        );

        Ok(distribution)
    }
}

/// A committed set of records with the tree needed to hand out proofs.
#[derive(Debug, Clone)]
pub struct Distribution<R> {
    root: Digest,
    total: u64,
    /// Records sorted by identity; position == leaf index
    entries: Vec<R>,
    tree: MerkleTree,
    index: HashMap<Identity, usize>,
}

impl<R: LeafRecord> Distribution<R> {
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Sum of record weights (the epoch's `total_amount` for entitlements).
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Records in leaf order.
    pub fn entries(&self) -> &[R] {
        &self.entries
    }

    /// Record committed for `identity`, if present.
    pub fn entry_for(&self, identity: &Identity) -> Option<&R> {
        self.index.get(identity).map(|&i| &self.entries[i])
    }

    /// Proof for `identity`, if present.
    pub fn proof_for(&self, identity: &Identity) -> Option<MerkleProof> {
        let index = *self.index.get(identity)?;
        self.tree.proof(index)
    }

    /// `(record, leaf, proof)` for every entry, in leaf order.
    pub fn iter_proofs(&self) -> impl Iterator<Item = (&R, Digest, MerkleProof)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, record)| {
            let leaf = self.tree.leaf(i)?;
            let proof = self.tree.proof(i)?;
            Some((record, leaf, proof))
        })
    }

    /// Check every emitted proof against the root.
    pub fn self_check(&self) -> Result<()> {
        for (record, leaf, proof) in self.iter_proofs() {
            if leaf != record.leaf() || !MerkleTree::verify(&self.root, &leaf, &proof) {
                return Err(ProverError::SelfCheckFailed(hex::encode(record.identity())));
            }
        }
        Ok(())
    }
}
