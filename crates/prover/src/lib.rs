//! Dropcraft Prover
//!
//! Leaf encoding, binary Merkle tree construction, proof verification and
//! the distribution builder.
//!
//! The `MerkleTree` and `verify_proof` are used by both the off-chain batch
//! job (to build distribution roots with a proof for each identity) and by
//! the ledger (to verify claims). There is one implementation of the leaf
//! encoding and the sorted-pair rule, shared by both sides.

pub mod distribution;
pub mod merkle;
pub mod traits;

pub use distribution::{Distribution, DistributionBuilder, DuplicatePolicy};
pub use merkle::{hash_pair, merkle_leaf, registration_leaf, verify_proof, MerkleProof, MerkleTree};
pub use traits::LeafRecord;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    #[error("Distribution has no entries")]
    EmptyDistribution,

    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(String),

    #[error("Zero amount for identity: {0}")]
    ZeroAmount(String),

    #[error("Distribution total overflows u64")]
    AmountOverflow,

    #[error("Proof self-check failed for identity: {0}")]
    SelfCheckFailed(String),
}

pub type Result<T> = std::result::Result<T, ProverError>;
