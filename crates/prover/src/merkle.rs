//! Binary Merkle tree for entitlement distributions.
//!
//! Entitlement leaf: `SHA256(0x00 || identity || amount_le_bytes)`.
//! Registration leaf: `SHA256(0x01 || identity || label_len_le || label || score_le_bytes)`.
//! Internal nodes: `SHA256(min(a, b) || max(a, b))` (sorted pair).
//! If a level has an odd node count, the last node is promoted to the next
//! level unchanged and contributes no sibling to proofs that pass through it.
//!
//! The ledger and the off-chain builder both go through this module, so a
//! proof produced here verifies there bit-for-bit.

use sha2::{Digest as _, Sha256};

use dropcraft_core::{Digest, Identity};

use crate::{ProverError, Result};

/// Record-kind tag prefixed to entitlement leaf preimages.
pub const ENTITLEMENT_LEAF_TAG: u8 = 0x00;

/// Record-kind tag prefixed to registration leaf preimages.
pub const REGISTRATION_LEAF_TAG: u8 = 0x01;

/// A Merkle proof: sibling hashes along the path to the root (bottom-up).
///
/// Sorted-pair hashing makes the path position-free, so no leaf index is
/// carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleProof {
    pub siblings: Vec<Digest>,
}

impl MerkleProof {
    pub fn new(siblings: Vec<Digest>) -> Self {
        Self { siblings }
    }

    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }
}

impl From<Vec<Digest>> for MerkleProof {
    fn from(siblings: Vec<Digest>) -> Self {
        Self { siblings }
    }
}

/// A binary Merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes stored level by level, bottom-up. `layers[0]` = leaves.
    layers: Vec<Vec<Digest>>,
}

/// Compute the leaf for an `(identity, amount)` entitlement.
pub fn merkle_leaf(identity: &Identity, amount: u64) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([ENTITLEMENT_LEAF_TAG]);
    hasher.update(identity);
    hasher.update(amount.to_le_bytes());
    hasher.finalize().into()
}

/// Compute the leaf for an `(identity, label, score)` registration.
///
/// The label is length-prefixed so `("ab", 1)` and `("a", ..)` can never
/// share a preimage.
pub fn registration_leaf(identity: &Identity, label: &str, score: u64) -> Digest {
    let label_bytes = label.as_bytes();
    let mut hasher = Sha256::new();
    hasher.update([REGISTRATION_LEAF_TAG]);
    hasher.update(identity);
    hasher.update((label_bytes.len() as u32).to_le_bytes());
    hasher.update(label_bytes);
    hasher.update(score.to_le_bytes());
    hasher.finalize().into()
}

/// Hash two nodes into their parent, smaller digest first.
pub fn hash_pair(a: &Digest, b: &Digest) -> Digest {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize().into()
}

/// Recompute a root from `leaf` and `proof` and compare it to `root`.
pub fn verify_proof(leaf: &Digest, proof: &[Digest], root: &Digest) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |current, sibling| hash_pair(&current, sibling));
    computed == *root
}

impl MerkleTree {
    /// Build a tree from leaves that are already in canonical order.
    pub fn from_leaves(leaves: Vec<Digest>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(ProverError::EmptyDistribution);
        }

        let mut layers = vec![leaves];

        loop {
            let prev = &layers[layers.len() - 1];
            if prev.len() <= 1 {
                break;
            }
            let next_layer: Vec<Digest> = prev
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            layers.push(next_layer);
        }

        Ok(Self { layers })
    }

    /// Get the Merkle root.
    pub fn root(&self) -> Digest {
        self.layers[self.layers.len() - 1][0]
    }

    /// Generate a proof for the leaf at the given index.
    ///
    /// Returns `None` if the index is out of range.
    pub fn proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        if leaf_index >= self.layers[0].len() {
            return None;
        }

        let mut siblings = Vec::with_capacity(self.depth());
        let mut idx = leaf_index;

        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_idx = idx ^ 1;
            // Promoted node: no sibling at this level
            if let Some(sibling) = layer.get(sibling_idx) {
                siblings.push(*sibling);
            }
            idx /= 2;
        }

        Some(MerkleProof { siblings })
    }

    /// Verify a Merkle proof against a given root and leaf hash.
    pub fn verify(root: &Digest, leaf: &Digest, proof: &MerkleProof) -> bool {
        verify_proof(leaf, &proof.siblings, root)
    }

    /// Leaf at `index`, if any.
    pub fn leaf(&self, index: usize) -> Option<Digest> {
        self.layers[0].get(index).copied()
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Number of levels above the leaves (0 for a single leaf).
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }
}
