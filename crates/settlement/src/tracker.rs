//! Exactly-once claim records, keyed by `(epoch, identity)`.

use std::collections::hash_map::{Entry, HashMap};

use dropcraft_core::{EpochId, Identity};

/// Per-epoch record of identities that have claimed, with the amount paid.
///
/// Records are write-once. There is no public way to clear one; the only
/// removal path is the ledger undoing a claim whose payout failed inside the
/// same call.
#[derive(Debug, Clone, Default)]
pub struct ClaimTracker {
    claims: HashMap<(EpochId, Identity), u64>,
}

impl ClaimTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, epoch: EpochId, identity: &Identity) -> bool {
        self.claims.contains_key(&(epoch, *identity))
    }

    /// Amount recorded for `(epoch, identity)`, if claimed.
    pub fn claimed(&self, epoch: EpochId, identity: &Identity) -> Option<u64> {
        self.claims.get(&(epoch, *identity)).copied()
    }

    /// Record a claim. Returns `false` (and changes nothing) if one exists.
    pub fn record(&mut self, epoch: EpochId, identity: Identity, amount: u64) -> bool {
        match self.claims.entry((epoch, identity)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(amount);
                true
            }
        }
    }

    /// Number of identities that claimed from `epoch`.
    pub fn claim_count(&self, epoch: EpochId) -> usize {
        self.claims.keys().filter(|(e, _)| *e == epoch).count()
    }

    /// Sum of recorded amounts for `epoch`.
    pub fn total_claimed(&self, epoch: EpochId) -> u64 {
        self.claims
            .iter()
            .filter(|((e, _), _)| *e == epoch)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Total number of records across all epochs.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub(crate) fn revert(&mut self, epoch: EpochId, identity: &Identity) -> Option<u64> {
        self.claims.remove(&(epoch, *identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_once() {
        let mut tracker = ClaimTracker::new();
        assert!(tracker.record(1, [1u8; 32], 100));
        assert!(!tracker.record(1, [1u8; 32], 100));
        assert!(!tracker.record(1, [1u8; 32], 5));
        assert_eq!(tracker.claimed(1, &[1u8; 32]), Some(100));
    }

    #[test]
    fn test_epochs_are_isolated() {
        let mut tracker = ClaimTracker::new();
        assert!(tracker.record(1, [1u8; 32], 100));
        assert!(tracker.record(2, [1u8; 32], 100));
        assert!(tracker.is_claimed(1, &[1u8; 32]));
        assert!(tracker.is_claimed(2, &[1u8; 32]));
        assert!(!tracker.is_claimed(3, &[1u8; 32]));
    }

    #[test]
    fn test_totals() {
        let mut tracker = ClaimTracker::new();
        tracker.record(1, [1u8; 32], 100);
        tracker.record(1, [2u8; 32], 200);
        tracker.record(2, [3u8; 32], 7);

        assert_eq!(tracker.claim_count(1), 2);
        assert_eq!(tracker.total_claimed(1), 300);
        assert_eq!(tracker.total_claimed(2), 7);
        assert_eq!(tracker.total_claimed(9), 0);
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_revert() {
        let mut tracker = ClaimTracker::new();
        tracker.record(1, [1u8; 32], 100);
        assert_eq!(tracker.revert(1, &[1u8; 32]), Some(100));
        assert!(!tracker.is_claimed(1, &[1u8; 32]));
        assert!(tracker.is_empty());
    }
}
