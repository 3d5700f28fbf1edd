//! Dropcraft Settlement
//!
//! The entitlement ledger: publishes Merkle roots as funded, time-boxed
//! epochs and redeems claims against them exactly once.
//!
//! ## Settlement Flow
//!
//! 1. **Fund**: The funding source deposits the backing asset into custody.
//! 2. **Create epoch**: An admin publishes `(root, total_amount, asset, window)`.
//!    Custody must already hold `total_amount` beyond what open epochs reserve.
//! 3. **Claim**: Each identity submits `(epoch, amount, proof)`. The ledger
//!    recomputes the root, records the claim, then pays out.
//! 4. **Cancel**: An admin may stop an epoch; completed claims stay valid.
//!
//! Checks and effects run under one lock and the clock is read once that
//! lock is held. Payouts run after the lock is released, so a vault may call
//! back into the ledger; a failed payout is undone before the call returns.

mod auth;
mod clock;
mod ledger;
pub mod registry;
mod tracker;
mod types;
mod vault;

pub use auth::{AdminSet, AuthContext, Authorizer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::Ledger;
pub use registry::{AllowAll, RegistrationRecord, Registry, ReputationOracle, Round, RoundId};
pub use tracker::ClaimTracker;
pub use types::*;
pub use vault::{AssetVault, MemoryVault, VaultError};

use dropcraft_core::EpochId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown epoch: {0}")]
    InvalidEpochId(EpochId),

    #[error("Epoch {0} is not active")]
    EpochNotActive(EpochId),

    #[error("Epoch {epoch} not started (starts at {start_time})")]
    EpochNotStarted { epoch: EpochId, start_time: u64 },

    #[error("Epoch {epoch} expired (ended at {end_time})")]
    EpochExpired { epoch: EpochId, end_time: u64 },

    #[error("Already claimed")]
    AlreadyClaimed,

    #[error("Invalid Merkle proof")]
    InvalidProof,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Insufficient funding: need {required}, available {available}")]
    InsufficientFunding { required: u64, available: u64 },

    #[error("Batch input arrays have different lengths")]
    ArrayLengthMismatch,

    #[error("Not authorized")]
    Unauthorized,

    #[error("Root must be non-zero")]
    InvalidRoot,

    #[error("End time {end_time} must be after start time {start_time}")]
    InvalidTimeWindow { start_time: u64, end_time: u64 },

    #[error("Claim exceeds total of epoch {0}")]
    ExceedsEpochTotal(EpochId),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Identity not eligible")]
    NotEligible,

    #[error("Unknown registration round: {0}")]
    InvalidRoundId(u64),
}

impl From<VaultError> for LedgerError {
    fn from(e: VaultError) -> Self {
        LedgerError::TransferFailed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
