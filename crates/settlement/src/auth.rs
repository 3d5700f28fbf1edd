//! Admin authorization at the call boundary.
//!
//! Admin operations take an `AuthContext` naming the caller; the ledger asks
//! its injected `Authorizer` whether that caller may proceed. Who counts as
//! an admin is decided outside the ledger.

use std::collections::HashSet;

use dropcraft_core::Identity;

/// The caller of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    caller: Identity,
}

impl AuthContext {
    pub fn new(caller: Identity) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &Identity {
        &self.caller
    }
}

/// Policy deciding who may run admin operations.
pub trait Authorizer: Send + Sync {
    fn is_admin(&self, caller: &Identity) -> bool;
}

/// Fixed set of admin identities.
#[derive(Debug, Clone, Default)]
pub struct AdminSet {
    admins: HashSet<Identity>,
}

impl AdminSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(admin: Identity) -> Self {
        Self {
            admins: HashSet::from([admin]),
        }
    }

    pub fn insert(&mut self, admin: Identity) -> bool {
        self.admins.insert(admin)
    }
}

impl FromIterator<Identity> for AdminSet {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        Self {
            admins: iter.into_iter().collect(),
        }
    }
}

impl Authorizer for AdminSet {
    fn is_admin(&self, caller: &Identity) -> bool {
        self.admins.contains(caller)
    }
}

impl<F> Authorizer for F
where
    F: Fn(&Identity) -> bool + Send + Sync,
{
    fn is_admin(&self, caller: &Identity) -> bool {
        self(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_set() {
        let admins = AdminSet::single([1u8; 32]);
        assert!(admins.is_admin(&[1u8; 32]));
        assert!(!admins.is_admin(&[2u8; 32]));
    }

    #[test]
    fn test_admin_set_from_iter() {
        let admins: AdminSet = [[1u8; 32], [2u8; 32]].into_iter().collect();
        assert!(admins.is_admin(&[2u8; 32]));
        assert!(!admins.is_admin(&[3u8; 32]));
    }

    #[test]
    fn test_closure_authorizer() {
        let policy = |caller: &Identity| caller[0] == 0xAD;
        assert!(policy.is_admin(&[0xAD; 32]));
        assert!(!policy.is_admin(&[0x00; 32]));
    }
}
