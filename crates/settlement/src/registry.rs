//! Registration rounds.
//!
//! Same commit-then-prove flow as the ledger, applied to registration
//! rights instead of payouts: an admin publishes the root of a
//! `(identity, label, score)` set as a round, and each identity registers
//! once by presenting its record and proof. Nothing is transferred.
//!
//! An external `ReputationOracle` may veto an otherwise valid registration.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use dropcraft_core::{Digest, Identity, ZERO_DIGEST};
use dropcraft_prover::{registration_leaf, verify_proof};

use crate::{AuthContext, Authorizer, Clock, LedgerError, Result};

pub type RoundId = u64;

/// Yes/no gate consulted before a registration is accepted.
pub trait ReputationOracle: Send + Sync {
    fn is_eligible(&self, identity: &Identity) -> bool;
}

/// Oracle that accepts everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ReputationOracle for AllowAll {
    fn is_eligible(&self, _identity: &Identity) -> bool {
        true
    }
}

impl<F> ReputationOracle for F
where
    F: Fn(&Identity) -> bool + Send + Sync,
{
    fn is_eligible(&self, identity: &Identity) -> bool {
        self(identity)
    }
}

/// A published registration round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub id: RoundId,
    pub root: Digest,
    pub start_time: u64,
    /// 0 = no end
    pub end_time: u64,
}

/// What was recorded for one registered identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub label: String,
    pub score: u64,
    pub registered_at: u64,
}

struct RegistryState {
    rounds: BTreeMap<RoundId, Round>,
    next_round_id: RoundId,
    registrations: HashMap<(RoundId, Identity), RegistrationRecord>,
}

/// Handle to a shared registry. Clones operate on the same state.
#[derive(Clone)]
pub struct Registry {
    state: Arc<Mutex<RegistryState>>,
    authorizer: Arc<dyn Authorizer>,
    oracle: Arc<dyn ReputationOracle>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    pub fn new(
        authorizer: impl Authorizer + 'static,
        oracle: impl ReputationOracle + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                rounds: BTreeMap::new(),
                next_round_id: 1,
                registrations: HashMap::new(),
            })),
            authorizer: Arc::new(authorizer),
            oracle: Arc::new(oracle),
            clock: Arc::new(clock),
        }
    }

    /// Publish a round over a registration tree root.
    pub fn open_round(
        &self,
        ctx: &AuthContext,
        root: Digest,
        start_time: u64,
        end_time: u64,
    ) -> Result<RoundId> {
        if !self.authorizer.is_admin(ctx.caller()) {
            return Err(LedgerError::Unauthorized);
        }
        if root == ZERO_DIGEST {
            return Err(LedgerError::InvalidRoot);
        }
        if end_time != 0 && end_time <= start_time {
            return Err(LedgerError::InvalidTimeWindow {
                start_time,
                end_time,
            });
        }

        let mut state = self.state.lock();
        let id = state.next_round_id;
        state.next_round_id += 1;
        state.rounds.insert(
            id,
            Round {
                id,
                root,
                start_time,
                end_time,
            },
        );

        info!(
            "Registration round {} opened (root: {}, window: {}..{})",
            id,
            hex::encode(&root[..8]),
            start_time,
            end_time,
        );
        Ok(id)
    }

    /// Register `identity` in `round` with the committed `(label, score)`.
    pub fn register(
        &self,
        identity: &Identity,
        round_id: RoundId,
        label: &str,
        score: u64,
        proof: &[Digest],
    ) -> Result<()> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        let round = state
            .rounds
            .get(&round_id)
            .ok_or(LedgerError::InvalidRoundId(round_id))?;
        if now < round.start_time {
            return Err(LedgerError::EpochNotStarted {
                epoch: round_id,
                start_time: round.start_time,
            });
        }
        if round.end_time != 0 && now > round.end_time {
            return Err(LedgerError::EpochExpired {
                epoch: round_id,
                end_time: round.end_time,
            });
        }
        if state.registrations.contains_key(&(round_id, *identity)) {
            return Err(LedgerError::AlreadyClaimed);
        }

        let leaf = registration_leaf(identity, label, score);
        if !verify_proof(&leaf, proof, &round.root) {
            debug!(
                "Registration proof for {} in round {} does not verify",
                hex::encode(&identity[..8]),
                round_id,
            );
            return Err(LedgerError::InvalidProof);
        }

        if !self.oracle.is_eligible(identity) {
            return Err(LedgerError::NotEligible);
        }

        state.registrations.insert(
            (round_id, *identity),
            RegistrationRecord {
                label: label.to_string(),
                score,
                registered_at: now,
            },
        );

        info!(
            "Identity {} registered in round {} as '{}' (score {})",
            hex::encode(&identity[..8]),
            round_id,
            label,
            score,
        );
        Ok(())
    }

    pub fn round(&self, round_id: RoundId) -> Option<Round> {
        let state = self.state.lock();
        state.rounds.get(&round_id).cloned()
    }

    pub fn registration(&self, round_id: RoundId, identity: &Identity) -> Option<RegistrationRecord> {
        let state = self.state.lock();
        state.registrations.get(&(round_id, *identity)).cloned()
    }

    pub fn registered_count(&self, round_id: RoundId) -> usize {
        let state = self.state.lock();
        state
            .registrations
            .keys()
            .filter(|(r, _)| *r == round_id)
            .count()
    }
}
