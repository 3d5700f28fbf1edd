//! Dropcraft
//!
//! Merkle-proof entitlement distribution. An off-chain batch job commits a
//! large `(identity, amount)` set to a single root; the ledger publishes
//! that root as a funded epoch and pays each identity once, on proof of
//! membership.
//!
//! This crate re-exports the workspace crates:
//!
//! - [`core`]: shared types and hex helpers
//! - [`prover`]: leaf encoding, tree building, proof verification
//! - [`settlement`]: the epoch ledger and registration rounds
//! - [`aggregator`]: input loading and artifact export

pub use dropcraft_aggregator as aggregator;
pub use dropcraft_core as core;
pub use dropcraft_prover as prover;
pub use dropcraft_settlement as settlement;

pub use dropcraft_core::{AssetRef, Digest, Entitlement, EpochId, Identity, Registration};
pub use dropcraft_prover::{verify_proof, Distribution, DistributionBuilder, DuplicatePolicy};
pub use dropcraft_settlement::{Ledger, LedgerError};
