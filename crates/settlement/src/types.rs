//! Ledger types: epochs, their derived phase, admin requests and events.

use dropcraft_core::{AssetRef, Digest, EpochId, Identity};

/// Phase of an epoch at a given time (derived, never stored)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochPhase {
    /// Created, but `now < start_time`
    Pending,
    /// Claims accepted
    Open,
    /// `end_time != 0` and `now > end_time`
    Expired,
    /// Cancelled by an admin (terminal)
    Cancelled,
}

/// Parameters for publishing a new epoch.
#[derive(Debug, Clone)]
pub struct CreateEpoch {
    /// Merkle root of the `(identity, amount)` distribution
    pub root: Digest,
    /// Sum of all amounts committed under `root`
    pub total_amount: u64,
    /// Asset the claims are paid in
    pub asset: AssetRef,
    /// First second at which claims are accepted (unix seconds)
    pub start_time: u64,
    /// Last second at which claims are accepted; 0 = no end
    pub end_time: u64,
}

/// On-ledger state of one distribution cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epoch {
    pub id: EpochId,
    pub root: Digest,
    pub total_amount: u64,
    pub asset: AssetRef,
    pub start_time: u64,
    pub end_time: u64,
    /// Sum of all successful claims
    pub claimed_amount: u64,
    /// False once cancelled
    pub active: bool,
}

impl Epoch {
    /// Determine the phase at `now`
    pub fn phase(&self, now: u64) -> EpochPhase {
        if !self.active {
            EpochPhase::Cancelled
        } else if now < self.start_time {
            EpochPhase::Pending
        } else if self.end_time != 0 && now > self.end_time {
            EpochPhase::Expired
        } else {
            EpochPhase::Open
        }
    }

    /// Amount not yet claimed
    pub fn remaining(&self) -> u64 {
        self.total_amount - self.claimed_amount
    }

    /// Whether this epoch still holds custody funds back from new epochs.
    ///
    /// Pending and open epochs reserve their unclaimed amount; cancelled and
    /// expired ones do not, since nothing can be claimed from them anymore.
    pub fn reserves_funds(&self, now: u64) -> bool {
        matches!(self.phase(now), EpochPhase::Pending | EpochPhase::Open)
    }
}

/// State changes recorded by the ledger, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Deposited {
        asset: AssetRef,
        amount: u64,
    },
    EpochCreated {
        epoch: EpochId,
        root: Digest,
        total_amount: u64,
        asset: AssetRef,
    },
    EpochCancelled {
        epoch: EpochId,
        claimed_amount: u64,
    },
    Claimed {
        epoch: EpochId,
        claimant: Identity,
        amount: u64,
    },
    EmergencyWithdrawal {
        asset: AssetRef,
        amount: u64,
        to: Identity,
    },
}
