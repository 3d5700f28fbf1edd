//! Leaf encoding trait for the record kinds a distribution can commit to.
//!
//! Both the distribution builder and the ledger hash records through
//! `LeafRecord::leaf`, so there is exactly one canonical encoding per kind.

use dropcraft_core::{Digest, Entitlement, Identity, Registration};

use crate::merkle::{merkle_leaf, registration_leaf};
use crate::{ProverError, Result};

/// A record that can be committed into a distribution tree.
pub trait LeafRecord: Clone {
    /// Identity the record belongs to (dedup and sort key).
    fn identity(&self) -> &Identity;

    /// Canonical leaf digest.
    fn leaf(&self) -> Digest;

    /// Value this record contributes to the distribution total.
    fn weight(&self) -> u64;

    /// Reject records that could never be redeemed.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl LeafRecord for Entitlement {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn leaf(&self) -> Digest {
        merkle_leaf(&self.identity, self.amount)
    }

    fn weight(&self) -> u64 {
        self.amount
    }

    fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(ProverError::ZeroAmount(hex::encode(self.identity)));
        }
        Ok(())
    }
}

impl LeafRecord for Registration {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn leaf(&self) -> Digest {
        registration_leaf(&self.identity, &self.label, self.score)
    }

    fn weight(&self) -> u64 {
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entitlement_leaf_matches_encoder() {
        let e = Entitlement::new([4u8; 32], 250);
        assert_eq!(e.leaf(), merkle_leaf(&[4u8; 32], 250));
        assert_eq!(e.weight(), 250);
        assert_eq!(e.identity(), &[4u8; 32]);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let e = Entitlement::new([4u8; 32], 0);
        assert!(matches!(e.validate(), Err(ProverError::ZeroAmount(_))));
    }

    #[test]
    fn test_registration_zero_score_allowed() {
        let r = Registration::new([5u8; 32], "newcomer", 0);
        assert!(r.validate().is_ok());
        assert_eq!(r.leaf(), registration_leaf(&[5u8; 32], "newcomer", 0));
    }
}
