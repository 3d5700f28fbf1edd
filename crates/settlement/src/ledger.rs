//! The entitlement ledger.
//!
//! One exclusively-owned state object holds every epoch (keyed by a
//! monotonic id), the claim tracker and the event log. `Ledger` is a
//! cloneable handle; every public operation takes the state lock, reads the
//! clock, validates and mutates before releasing it.
//!
//! Claims follow checks-effects-interactions: custody is checked with the
//! vault, the claim record and `claimed_amount` are written, and only then is
//! the lock dropped and the vault transfer made. A failed transfer re-takes
//! the lock and undoes the record. While a payout is in flight the claim is
//! already recorded, so a vault that calls back into the ledger sees
//! `AlreadyClaimed` for the same `(epoch, identity)`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use dropcraft_core::{AssetRef, Digest, EpochId, Identity, ZERO_DIGEST};
use dropcraft_prover::{merkle_leaf, verify_proof};

use crate::{
    AssetVault, AuthContext, Authorizer, ClaimTracker, Clock, CreateEpoch, Epoch, EpochPhase,
    LedgerError, LedgerEvent, Result,
};

struct LedgerState {
    epochs: BTreeMap<EpochId, Epoch>,
    /// Next id to assign; ids start at 1 and are never reused
    next_epoch_id: EpochId,
    tracker: ClaimTracker,
    events: Vec<LedgerEvent>,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            epochs: BTreeMap::new(),
            next_epoch_id: 1,
            tracker: ClaimTracker::new(),
            events: Vec::new(),
        }
    }

    fn epoch(&self, id: EpochId) -> Result<&Epoch> {
        self.epochs.get(&id).ok_or(LedgerError::InvalidEpochId(id))
    }

    /// Unclaimed amount of `asset` owed by epochs that can still pay out.
    fn reserved(&self, asset: &AssetRef, now: u64) -> u64 {
        self.epochs
            .values()
            .filter(|e| e.asset == *asset && e.reserves_funds(now))
            .map(Epoch::remaining)
            .fold(0u64, u64::saturating_add)
    }

    /// Every check `claim` performs, without side effects. Returns the
    /// epoch's asset.
    fn check_claim(
        &self,
        now: u64,
        epoch_id: EpochId,
        claimant: &Identity,
        amount: u64,
        proof: &[Digest],
    ) -> Result<AssetRef> {
        let epoch = self.epoch(epoch_id)?;

        match epoch.phase(now) {
            EpochPhase::Cancelled => return Err(LedgerError::EpochNotActive(epoch_id)),
            EpochPhase::Pending => {
                return Err(LedgerError::EpochNotStarted {
                    epoch: epoch_id,
                    start_time: epoch.start_time,
                })
            }
            EpochPhase::Expired => {
                return Err(LedgerError::EpochExpired {
                    epoch: epoch_id,
                    end_time: epoch.end_time,
                })
            }
            EpochPhase::Open => {}
        }

        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        if self.tracker.is_claimed(epoch_id, claimant) {
            return Err(LedgerError::AlreadyClaimed);
        }

        let leaf = merkle_leaf(claimant, amount);
        if !verify_proof(&leaf, proof, &epoch.root) {
            return Err(LedgerError::InvalidProof);
        }

        let claimed = epoch
            .claimed_amount
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;
        if claimed > epoch.total_amount {
            return Err(LedgerError::ExceedsEpochTotal(epoch_id));
        }

        Ok(epoch.asset)
    }

    fn apply_claim(&mut self, epoch_id: EpochId, claimant: &Identity, amount: u64) {
        self.tracker.record(epoch_id, *claimant, amount);
        if let Some(epoch) = self.epochs.get_mut(&epoch_id) {
            epoch.claimed_amount += amount;
        }
    }

    fn revert_claim(&mut self, epoch_id: EpochId, claimant: &Identity) {
        if let Some(amount) = self.tracker.revert(epoch_id, claimant) {
            if let Some(epoch) = self.epochs.get_mut(&epoch_id) {
                epoch.claimed_amount -= amount;
            }
        }
    }
}

/// Handle to a shared ledger. Clones operate on the same state.
#[derive(Clone)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
    vault: Arc<dyn AssetVault>,
    authorizer: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(
        authorizer: impl Authorizer + 'static,
        vault: impl AssetVault + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::new())),
            vault: Arc::new(vault),
            authorizer: Arc::new(authorizer),
            clock: Arc::new(clock),
        }
    }

    fn authorize(&self, ctx: &AuthContext) -> Result<()> {
        if self.authorizer.is_admin(ctx.caller()) {
            Ok(())
        } else {
            warn!("Rejected admin call from {}", hex::encode(&ctx.caller()[..8]));
            Err(LedgerError::Unauthorized)
        }
    }

    /// State checks for one claim followed by the vault's own check of the
    /// payout. Returns the epoch's asset.
    fn check_locked(
        &self,
        state: &LedgerState,
        now: u64,
        epoch_id: EpochId,
        claimant: &Identity,
        amount: u64,
        proof: &[Digest],
    ) -> Result<AssetRef> {
        let asset = state.check_claim(now, epoch_id, claimant, amount, proof)?;
        self.vault.check_transfer(&asset, claimant, amount)?;
        Ok(asset)
    }

    // ==================== Funding ====================

    /// Credit custody with `amount` of `asset`. Called by the funding source
    /// before `create_epoch`; the ledger never pulls funds itself.
    pub fn deposit(&self, asset: AssetRef, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.vault.deposit(&asset, amount)?;
        self.state
            .lock()
            .events
            .push(LedgerEvent::Deposited { asset, amount });

        info!(
            "Deposited {} of asset {} (custody now {})",
            amount,
            hex::encode(&asset[..8]),
            self.vault.balance_of(&asset),
        );
        Ok(())
    }

    // ==================== Epoch Management ====================

    /// Publish a new epoch. Custody must already cover `total_amount` on top
    /// of what open epochs in the same asset still owe.
    pub fn create_epoch(&self, ctx: &AuthContext, params: CreateEpoch) -> Result<EpochId> {
        self.authorize(ctx)?;

        if params.root == ZERO_DIGEST {
            return Err(LedgerError::InvalidRoot);
        }
        if params.total_amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if params.end_time != 0 && params.end_time <= params.start_time {
            return Err(LedgerError::InvalidTimeWindow {
                start_time: params.start_time,
                end_time: params.end_time,
            });
        }

        let mut state = self.state.lock();
        let now = self.clock.now();

        let held = self.vault.balance_of(&params.asset);
        let available = held.saturating_sub(state.reserved(&params.asset, now));
        if available < params.total_amount {
            return Err(LedgerError::InsufficientFunding {
                required: params.total_amount,
                available,
            });
        }

        let id = state.next_epoch_id;
        state.next_epoch_id += 1;

        state.epochs.insert(
            id,
            Epoch {
                id,
                root: params.root,
                total_amount: params.total_amount,
                asset: params.asset,
                start_time: params.start_time,
                end_time: params.end_time,
                claimed_amount: 0,
                active: true,
            },
        );
        state.events.push(LedgerEvent::EpochCreated {
            epoch: id,
            root: params.root,
            total_amount: params.total_amount,
            asset: params.asset,
        });

        info!(
            "Epoch {} created (root: {}, total: {}, asset: {}, window: {}..{})",
            id,
            hex::encode(&params.root[..8]),
            params.total_amount,
            hex::encode(&params.asset[..8]),
            params.start_time,
            params.end_time,
        );
        Ok(id)
    }

    /// Stop an epoch. Terminal; claims already paid are untouched and no
    /// funds move.
    pub fn cancel_epoch(&self, ctx: &AuthContext, epoch_id: EpochId) -> Result<()> {
        self.authorize(ctx)?;

        let mut state = self.state.lock();
        let epoch = state
            .epochs
            .get_mut(&epoch_id)
            .ok_or(LedgerError::InvalidEpochId(epoch_id))?;
        if !epoch.active {
            return Err(LedgerError::EpochNotActive(epoch_id));
        }

        epoch.active = false;
        let claimed_amount = epoch.claimed_amount;
        state.events.push(LedgerEvent::EpochCancelled {
            epoch: epoch_id,
            claimed_amount,
        });

        info!("Epoch {} cancelled (claimed so far: {})", epoch_id, claimed_amount);
        Ok(())
    }

    // ==================== Claims ====================

    /// Redeem `claimant`'s entitlement of `amount` from `epoch_id`.
    pub fn claim(
        &self,
        claimant: &Identity,
        epoch_id: EpochId,
        amount: u64,
        proof: &[Digest],
    ) -> Result<()> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        // Checks
        let asset = self
            .check_locked(&state, now, epoch_id, claimant, amount, proof)
            .map_err(|e| {
                warn!(
                    "Claim by {} on epoch {} rejected: {}",
                    hex::encode(&claimant[..8]),
                    epoch_id,
                    e,
                );
                e
            })?;

        // Effects
        state.apply_claim(epoch_id, claimant, amount);
        drop(state);

        // Interactions
        if let Err(e) = self.vault.transfer(&asset, claimant, amount) {
            self.state.lock().revert_claim(epoch_id, claimant);
            warn!(
                "Payout of {} to {} for epoch {} failed, claim reverted: {}",
                amount,
                hex::encode(&claimant[..8]),
                epoch_id,
                e,
            );
            return Err(e.into());
        }

        self.state.lock().events.push(LedgerEvent::Claimed {
            epoch: epoch_id,
            claimant: *claimant,
            amount,
        });

        info!(
            "Identity {} claimed {} from epoch {}",
            hex::encode(&claimant[..8]),
            amount,
            epoch_id,
        );
        Ok(())
    }

    /// Redeem several entitlements in one call.
    ///
    /// Every tuple is validated (including repeats of the same epoch within
    /// the batch, and the payout per asset against the vault) before anything
    /// is written, so a rejected batch changes nothing. Payouts are one
    /// transfer per asset in asset order. If the vault still refuses one, the
    /// epochs whose asset was not yet paid are reverted, the ones already
    /// paid stay claimed with their events logged, and the error is returned.
    /// Returns the total amount paid.
    pub fn claim_multiple(
        &self,
        claimant: &Identity,
        epoch_ids: &[EpochId],
        amounts: &[u64],
        proofs: &[Vec<Digest>],
    ) -> Result<u64> {
        if epoch_ids.len() != amounts.len() || epoch_ids.len() != proofs.len() {
            return Err(LedgerError::ArrayLengthMismatch);
        }

        let mut state = self.state.lock();
        let now = self.clock.now();

        // Checks
        let mut seen = HashSet::with_capacity(epoch_ids.len());
        let mut batch: Vec<(EpochId, AssetRef, u64)> = Vec::with_capacity(epoch_ids.len());
        let mut per_asset: BTreeMap<AssetRef, u64> = BTreeMap::new();
        for ((&epoch_id, &amount), proof) in epoch_ids.iter().zip(amounts).zip(proofs) {
            if !seen.insert(epoch_id) {
                return Err(LedgerError::AlreadyClaimed);
            }
            let asset = state.check_claim(now, epoch_id, claimant, amount, proof)?;
            let owed = per_asset.entry(asset).or_insert(0);
            *owed = owed.checked_add(amount).ok_or(LedgerError::AmountOverflow)?;
            batch.push((epoch_id, asset, amount));
        }
        for (asset, owed) in &per_asset {
            self.vault.check_transfer(asset, claimant, *owed)?;
        }

        // Effects
        for &(epoch_id, _, amount) in &batch {
            state.apply_claim(epoch_id, claimant, amount);
        }
        drop(state);

        // Interactions: one payout per asset
        let mut paid_assets: Vec<AssetRef> = Vec::with_capacity(per_asset.len());
        for (asset, owed) in &per_asset {
            if let Err(e) = self.vault.transfer(asset, claimant, *owed) {
                let mut state = self.state.lock();
                for &(epoch_id, epoch_asset, amount) in &batch {
                    if paid_assets.contains(&epoch_asset) {
                        state.events.push(LedgerEvent::Claimed {
                            epoch: epoch_id,
                            claimant: *claimant,
                            amount,
                        });
                    } else {
                        state.revert_claim(epoch_id, claimant);
                    }
                }
                warn!(
                    "Batch payout to {} failed after {} of {} assets, unpaid claims reverted: {}",
                    hex::encode(&claimant[..8]),
                    paid_assets.len(),
                    per_asset.len(),
                    e,
                );
                return Err(e.into());
            }
            paid_assets.push(*asset);
        }

        let mut state = self.state.lock();
        let mut total: u64 = 0;
        for &(epoch_id, _, amount) in &batch {
            state.events.push(LedgerEvent::Claimed {
                epoch: epoch_id,
                claimant: *claimant,
                amount,
            });
            total = total.saturating_add(amount);
        }
        drop(state);

        info!(
            "Identity {} claimed {} across {} epochs",
            hex::encode(&claimant[..8]),
            total,
            epoch_ids.len(),
        );
        Ok(total)
    }

    // ==================== Admin ====================

    /// Move custody funds out, bypassing all epoch accounting. Operator
    /// recovery only.
    pub fn emergency_withdraw(
        &self,
        ctx: &AuthContext,
        asset: AssetRef,
        amount: u64,
        to: Identity,
    ) -> Result<()> {
        self.authorize(ctx)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        self.vault.transfer(&asset, &to, amount)?;
        self.state
            .lock()
            .events
            .push(LedgerEvent::EmergencyWithdrawal { asset, amount, to });

        warn!(
            "Emergency withdrawal of {} of asset {} to {} by {}",
            amount,
            hex::encode(&asset[..8]),
            hex::encode(&to[..8]),
            hex::encode(&ctx.caller()[..8]),
        );
        Ok(())
    }

    // ==================== Query Methods ====================

    /// Run every `claim` check, custody included, without changing anything.
    pub fn check_claim(
        &self,
        epoch_id: EpochId,
        claimant: &Identity,
        amount: u64,
        proof: &[Digest],
    ) -> Result<()> {
        let state = self.state.lock();
        let now = self.clock.now();
        self.check_locked(&state, now, epoch_id, claimant, amount, proof)
            .map(|_| ())
    }

    /// Whether `claim` would currently succeed.
    pub fn verify(
        &self,
        epoch_id: EpochId,
        claimant: &Identity,
        amount: u64,
        proof: &[Digest],
    ) -> bool {
        self.check_claim(epoch_id, claimant, amount, proof).is_ok()
    }

    /// `total_amount - claimed_amount` for the epoch.
    pub fn remaining(&self, epoch_id: EpochId) -> Result<u64> {
        let state = self.state.lock();
        state.epoch(epoch_id).map(Epoch::remaining)
    }

    pub fn claimed_amount(&self, epoch_id: EpochId) -> Result<u64> {
        let state = self.state.lock();
        state.epoch(epoch_id).map(|e| e.claimed_amount)
    }

    /// Snapshot of an epoch.
    pub fn epoch(&self, epoch_id: EpochId) -> Option<Epoch> {
        let state = self.state.lock();
        state.epochs.get(&epoch_id).cloned()
    }

    pub fn phase(&self, epoch_id: EpochId) -> Result<EpochPhase> {
        let state = self.state.lock();
        let now = self.clock.now();
        state.epoch(epoch_id).map(|e| e.phase(now))
    }

    pub fn is_claimed(&self, epoch_id: EpochId, claimant: &Identity) -> bool {
        let state = self.state.lock();
        state.tracker.is_claimed(epoch_id, claimant)
    }

    /// Amount `claimant` received from `epoch_id`, if they claimed.
    pub fn claimed_by(&self, epoch_id: EpochId, claimant: &Identity) -> Option<u64> {
        let state = self.state.lock();
        state.tracker.claimed(epoch_id, claimant)
    }

    /// Sum of the claim records for `epoch_id` (equals `claimed_amount`).
    pub fn tracked_total(&self, epoch_id: EpochId) -> u64 {
        let state = self.state.lock();
        state.tracker.total_claimed(epoch_id)
    }

    pub fn epoch_count(&self) -> usize {
        let state = self.state.lock();
        state.epochs.len()
    }

    /// Amount of `asset` in custody.
    pub fn custody_balance(&self, asset: &AssetRef) -> u64 {
        self.vault.balance_of(asset)
    }

    /// Amount of `asset` still owed by pending and open epochs.
    pub fn reserved(&self, asset: &AssetRef) -> u64 {
        let state = self.state.lock();
        let now = self.clock.now();
        state.reserved(asset, now)
    }

    /// Copy of the event log, oldest first.
    pub fn events(&self) -> Vec<LedgerEvent> {
        let state = self.state.lock();
        state.events.clone()
    }
}
