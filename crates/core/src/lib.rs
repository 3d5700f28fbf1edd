//! Dropcraft Core
//!
//! Types shared by the off-chain tree builder, the ledger, and the exporter:
//! identities, digests, asset references and the two entitlement record kinds.

mod types;

pub use types::*;
