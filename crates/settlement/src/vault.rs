//! Custody of the backing assets.
//!
//! `AssetVault` is the seam between the ledger and whatever actually moves
//! value (a token program, a bank adapter). `MemoryVault` keeps balances
//! in-process: custody per asset plus what each recipient has been paid.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use dropcraft_core::{AssetRef, Identity};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("insufficient custody of asset {asset}: requested {requested}, held {held}")]
    InsufficientBalance {
        asset: String,
        requested: u64,
        held: u64,
    },

    #[error("balance overflow")]
    Overflow,
}

/// Value movement used by the ledger.
///
/// `balance_of` and `check_transfer` run while the ledger holds its state
/// lock and must not call back into the ledger. `deposit` and `transfer`
/// run with the lock released.
pub trait AssetVault: Send + Sync {
    /// Amount of `asset` currently held in custody.
    fn balance_of(&self, asset: &AssetRef) -> u64;

    /// Whether `transfer` with the same arguments would succeed right now.
    /// Must not move anything.
    fn check_transfer(
        &self,
        asset: &AssetRef,
        to: &Identity,
        amount: u64,
    ) -> Result<(), VaultError>;

    /// Credit custody (called on behalf of the funding source).
    fn deposit(&self, asset: &AssetRef, amount: u64) -> Result<(), VaultError>;

    /// Move `amount` of `asset` out of custody to `to`.
    fn transfer(&self, asset: &AssetRef, to: &Identity, amount: u64) -> Result<(), VaultError>;
}

#[derive(Debug, Default)]
struct VaultState {
    custody: HashMap<AssetRef, u64>,
    paid: HashMap<(AssetRef, Identity), u64>,
}

/// In-memory vault. Clones share the same balances.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    state: Arc<Mutex<VaultState>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total amount of `asset` paid out to `holder`.
    pub fn paid_to(&self, asset: &AssetRef, holder: &Identity) -> u64 {
        let state = self.state.lock();
        state.paid.get(&(*asset, *holder)).copied().unwrap_or(0)
    }
}

impl VaultState {
    /// Custody and paid balances after moving `amount` to `to`.
    fn after_transfer(
        &self,
        asset: &AssetRef,
        to: &Identity,
        amount: u64,
    ) -> Result<(u64, u64), VaultError> {
        let held = self.custody.get(asset).copied().unwrap_or(0);
        if held < amount {
            return Err(VaultError::InsufficientBalance {
                asset: hex::encode(&asset[..8]),
                requested: amount,
                held,
            });
        }

        let paid = self.paid.get(&(*asset, *to)).copied().unwrap_or(0);
        let paid = paid.checked_add(amount).ok_or(VaultError::Overflow)?;
        Ok((held - amount, paid))
    }
}

impl AssetVault for MemoryVault {
    fn balance_of(&self, asset: &AssetRef) -> u64 {
        let state = self.state.lock();
        state.custody.get(asset).copied().unwrap_or(0)
    }

    fn deposit(&self, asset: &AssetRef, amount: u64) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let held = state.custody.entry(*asset).or_insert(0);
        *held = held.checked_add(amount).ok_or(VaultError::Overflow)?;
        Ok(())
    }

    fn check_transfer(
        &self,
        asset: &AssetRef,
        to: &Identity,
        amount: u64,
    ) -> Result<(), VaultError> {
        let state = self.state.lock();
        state.after_transfer(asset, to, amount).map(|_| ())
    }

    fn transfer(&self, asset: &AssetRef, to: &Identity, amount: u64) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        let (held, paid) = state.after_transfer(asset, to, amount)?;
        state.custody.insert(*asset, held);
        state.paid.insert((*asset, *to), paid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: AssetRef = [0xCC; 32];

    #[test]
    fn test_deposit_and_transfer() {
        let vault = MemoryVault::new();
        vault.deposit(&USDC, 500).unwrap();
        assert_eq!(vault.balance_of(&USDC), 500);

        vault.transfer(&USDC, &[1u8; 32], 120).unwrap();
        assert_eq!(vault.balance_of(&USDC), 380);
        assert_eq!(vault.paid_to(&USDC, &[1u8; 32]), 120);
    }

    #[test]
    fn test_transfer_more_than_held() {
        let vault = MemoryVault::new();
        vault.deposit(&USDC, 10).unwrap();

        let result = vault.transfer(&USDC, &[1u8; 32], 11);
        assert!(matches!(
            result,
            Err(VaultError::InsufficientBalance { requested: 11, held: 10, .. })
        ));
        assert_eq!(vault.balance_of(&USDC), 10);
        assert_eq!(vault.paid_to(&USDC, &[1u8; 32]), 0);
    }

    #[test]
    fn test_deposit_overflow() {
        let vault = MemoryVault::new();
        vault.deposit(&USDC, u64::MAX).unwrap();
        assert_eq!(vault.deposit(&USDC, 1), Err(VaultError::Overflow));
    }

    #[test]
    fn test_check_transfer_matches_transfer() {
        let vault = MemoryVault::new();
        let to = [1u8; 32];
        vault.deposit(&USDC, u64::MAX).unwrap();

        vault.check_transfer(&USDC, &to, 10).unwrap();
        assert_eq!(vault.balance_of(&USDC), u64::MAX);
        assert_eq!(vault.paid_to(&USDC, &to), 0);

        vault.transfer(&USDC, &to, u64::MAX - 5).unwrap();
        vault.deposit(&USDC, u64::MAX - 5).unwrap();

        // Custody covers it but the recipient's running total would wrap
        assert_eq!(vault.check_transfer(&USDC, &to, 6), Err(VaultError::Overflow));
        assert_eq!(vault.transfer(&USDC, &to, 6), Err(VaultError::Overflow));
        vault.check_transfer(&USDC, &to, 5).unwrap();
    }

    #[test]
    fn test_clones_share_state() {
        let vault = MemoryVault::new();
        let handle = vault.clone();
        vault.deposit(&USDC, 42).unwrap();
        assert_eq!(handle.balance_of(&USDC), 42);
    }

    #[test]
    fn test_assets_are_separate() {
        let vault = MemoryVault::new();
        vault.deposit(&USDC, 42).unwrap();
        assert_eq!(vault.balance_of(&[0xDD; 32]), 0);
    }
}
