//! On-disk artifact formats.
//!
//! All digests and identities are lowercase hex without `0x`. The record's
//! own fields are flattened into each leaf and proof object, so an
//! entitlement leaf reads `{identity, amount, leaf, proof}` and a
//! registration leaf reads `{identity, label, score, leaf, proof}`.

use serde::{Deserialize, Serialize};

use dropcraft_core::{hex32, hex32_vec, Digest, Identity};
use dropcraft_prover::{verify_proof, Distribution, LeafRecord};

/// Full distribution: root, totals and every leaf with its proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeFile<R> {
    #[serde(with = "hex32")]
    pub root: Digest,
    pub total_leaves: usize,
    pub total_amount: u64,
    /// Unix seconds at export time
    pub generated_at: u64,
    pub leaves: Vec<TreeLeaf<R>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeLeaf<R> {
    #[serde(flatten)]
    pub record: R,
    #[serde(with = "hex32")]
    pub leaf: Digest,
    #[serde(with = "hex32_vec")]
    pub proof: Vec<Digest>,
}

/// Everything one identity needs to claim: its record, proof and the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofFile<R> {
    #[serde(flatten)]
    pub record: R,
    #[serde(with = "hex32_vec")]
    pub proof: Vec<Digest>,
    #[serde(with = "hex32")]
    pub root: Digest,
}

impl<R: LeafRecord> TreeFile<R> {
    pub fn from_distribution(distribution: &Distribution<R>, generated_at: u64) -> Self {
        let leaves = distribution
            .iter_proofs()
            .map(|(record, leaf, proof)| TreeLeaf {
                record: record.clone(),
                leaf,
                proof: proof.siblings,
            })
            .collect();

        Self {
            root: distribution.root(),
            total_leaves: distribution.len(),
            total_amount: distribution.total(),
            generated_at,
            leaves,
        }
    }

    pub fn leaf_for(&self, identity: &Identity) -> Option<&TreeLeaf<R>> {
        self.leaves.iter().find(|l| l.record.identity() == identity)
    }

    /// Proof file for `identity`, if it is in the tree.
    pub fn proof_file(&self, identity: &Identity) -> Option<ProofFile<R>> {
        self.leaf_for(identity).map(|l| ProofFile {
            record: l.record.clone(),
            proof: l.proof.clone(),
            root: self.root,
        })
    }

    /// Longest proof in the file (the tree depth).
    pub fn depth(&self) -> usize {
        self.leaves.iter().map(|l| l.proof.len()).max().unwrap_or(0)
    }

    /// Identity of the first leaf that does not check out, if any.
    ///
    /// A leaf fails if its stored digest differs from the re-encoded record
    /// or its proof does not lead to the root.
    pub fn first_invalid(&self) -> Option<Identity> {
        for l in &self.leaves {
            let leaf = l.record.leaf();
            if leaf != l.leaf || !verify_proof(&leaf, &l.proof, &self.root) {
                return Some(*l.record.identity());
            }
        }
        None
    }

    /// Whether the header agrees with the leaves and every leaf verifies.
    pub fn is_consistent(&self) -> bool {
        let total = self
            .leaves
            .iter()
            .try_fold(0u64, |acc, l| acc.checked_add(l.record.weight()));
        self.total_leaves == self.leaves.len()
            && total == Some(self.total_amount)
            && self.first_invalid().is_none()
    }
}

impl<R: LeafRecord> ProofFile<R> {
    pub fn identity(&self) -> &Identity {
        self.record.identity()
    }

    /// Verify against the root carried in the file.
    pub fn verify(&self) -> bool {
        self.verify_against(&self.root)
    }

    /// Verify against an independently obtained root (e.g. the published
    /// epoch root).
    pub fn verify_against(&self, root: &Digest) -> bool {
        verify_proof(&self.record.leaf(), &self.proof, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropcraft_core::{Entitlement, Registration};
    use dropcraft_prover::DistributionBuilder;

    fn tree() -> TreeFile<Entitlement> {
        let dist = DistributionBuilder::new()
            .build(vec![
                Entitlement::new([0xA1; 32], 100),
                Entitlement::new([0xB2; 32], 200),
                Entitlement::new([0xC3; 32], 150),
            ])
            .unwrap();
        TreeFile::from_distribution(&dist, 1_700_000_000)
    }

    #[test]
    fn test_tree_file_json_shape() {
        let json = serde_json::to_value(tree()).unwrap();

        assert_eq!(json["root"].as_str().unwrap().len(), 64);
        assert_eq!(json["totalLeaves"], 3);
        assert_eq!(json["totalAmount"], 450);
        assert_eq!(json["generatedAt"], 1_700_000_000u64);

        let first = &json["leaves"][0];
        assert_eq!(first["identity"], hex::encode([0xA1; 32]));
        assert_eq!(first["amount"], 100);
        assert!(first["leaf"].is_string());
        assert!(first["proof"].is_array());
    }

    #[test]
    fn test_tree_file_reads_back() {
        let original = tree();
        let json = serde_json::to_string_pretty(&original).unwrap();
        let parsed: TreeFile<Entitlement> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
        assert!(parsed.is_consistent());
    }

    #[test]
    fn test_edited_amount_detected() {
        let mut file = tree();
        file.leaves[1].record.amount += 1;
        assert_eq!(file.first_invalid(), Some([0xB2; 32]));
        assert!(!file.is_consistent());
    }

    #[test]
    fn test_edited_total_detected() {
        let mut file = tree();
        file.total_amount = 1_000;
        assert!(file.first_invalid().is_none());
        assert!(!file.is_consistent());
    }

    #[test]
    fn test_proof_file() {
        let file = tree();
        let proof = file.proof_file(&[0xC3; 32]).unwrap();
        assert_eq!(proof.record.amount, 150);
        assert!(proof.verify());
        assert!(!proof.verify_against(&[0u8; 32]));
        assert!(file.proof_file(&[0xEE; 32]).is_none());

        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["identity"], hex::encode([0xC3; 32]));
        assert_eq!(json["root"], hex::encode(file.root));
    }

    #[test]
    fn test_registration_tree_uses_label_and_score() {
        let dist = DistributionBuilder::new()
            .build(vec![
                Registration::new([1u8; 32], "alice.dev", 12),
                Registration::new([2u8; 32], "bob.dev", 30),
            ])
            .unwrap();
        let file = TreeFile::from_distribution(&dist, 0);
        let json = serde_json::to_value(&file).unwrap();

        assert_eq!(json["leaves"][0]["label"], "alice.dev");
        assert_eq!(json["leaves"][0]["score"], 12);
        assert!(json["leaves"][0].get("amount").is_none());
        assert_eq!(json["totalAmount"], 42);
        assert!(file.is_consistent());
    }
}
