//! Administrator gate.
//!
//! Who the administrator is lives in an external [`Ownership`] component and is
//! read fresh on every check. [`AccessGuard::authorize`] is the only way to obtain
//! an [`AdminCapability`], and root registration requires one, so the registry
//! cannot be mutated without passing the gate.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use dropcraft_core::AccountId;

use crate::{DistributorError, Result};

/// Source of truth for the current administrator.
pub trait Ownership: Send + Sync {
    fn current_administrator(&self) -> AccountId;
}

/// Single-owner ownership record with hand-over.
#[derive(Debug)]
pub struct Ownable {
    owner: RwLock<AccountId>,
}

impl Ownable {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner: RwLock::new(owner),
        }
    }

    /// Hand ownership to `new_owner`. Only the current owner may do this.
    pub fn transfer_ownership(&self, caller: &AccountId, new_owner: AccountId) -> Result<()> {
        let mut owner = self.owner.write().expect("ownership lock poisoned");
        if *owner != *caller {
            warn!("Ownership transfer rejected: {} is not the owner", caller.short());
            return Err(DistributorError::Unauthorized { caller: *caller });
        }
        if new_owner.is_zero() {
            return Err(DistributorError::InvalidOwner(new_owner));
        }

        info!("Ownership transferred: {} -> {}", owner.short(), new_owner.short());
        *owner = new_owner;
        Ok(())
    }
}

impl Ownership for Ownable {
    fn current_administrator(&self) -> AccountId {
        *self.owner.read().expect("ownership lock poisoned")
    }
}

/// Proof that the holder passed the administrator check.
///
/// Not constructible outside this crate; the guard mints it.
#[derive(Debug)]
pub struct AdminCapability {
    administrator: AccountId,
}

impl AdminCapability {
    pub(crate) fn new(administrator: AccountId) -> Self {
        Self { administrator }
    }

    /// The administrator that was authorized
    pub fn administrator(&self) -> AccountId {
        self.administrator
    }
}

/// Checks callers against the current administrator.
pub struct AccessGuard {
    ownership: Arc<dyn Ownership>,
}

impl AccessGuard {
    pub fn new(ownership: Arc<dyn Ownership>) -> Self {
        Self { ownership }
    }

    pub fn administrator(&self) -> AccountId {
        self.ownership.current_administrator()
    }

    /// Succeeds iff `caller` equals the administrator at the time of the call.
    pub fn authorize(&self, caller: &AccountId) -> Result<AdminCapability> {
        let administrator = self.ownership.current_administrator();
        if *caller != administrator {
            warn!("Unauthorized admin call from {}", caller.short());
            return Err(DistributorError::Unauthorized { caller: *caller });
        }
        Ok(AdminCapability::new(administrator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropcraft_core::Address;

    fn admin() -> AccountId {
        Address::repeat(0xAD)
    }

    #[test]
    fn test_authorize_admin() {
        let guard = AccessGuard::new(Arc::new(Ownable::new(admin())));
        let cap = guard.authorize(&admin()).unwrap();
        assert_eq!(cap.administrator(), admin());
    }

    #[test]
    fn test_authorize_rejects_other_caller() {
        let guard = AccessGuard::new(Arc::new(Ownable::new(admin())));
        let other = Address::repeat(0x01);
        match guard.authorize(&other) {
            Err(DistributorError::Unauthorized { caller }) => assert_eq!(caller, other),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_guard_follows_ownership_transfer() {
        let ownable = Arc::new(Ownable::new(admin()));
        let guard = AccessGuard::new(ownable.clone());
        let next = Address::repeat(0x02);

        ownable.transfer_ownership(&admin(), next).unwrap();

        assert_eq!(guard.administrator(), next);
        assert!(guard.authorize(&next).is_ok());
        assert!(guard.authorize(&admin()).is_err());
    }

    #[test]
    fn test_transfer_ownership_requires_owner() {
        let ownable = Ownable::new(admin());
        let stranger = Address::repeat(0x03);
        let result = ownable.transfer_ownership(&stranger, stranger);
        assert!(matches!(result, Err(DistributorError::Unauthorized { .. })));
        assert_eq!(ownable.current_administrator(), admin());
    }

    #[test]
    fn test_transfer_ownership_rejects_zero_owner() {
        let ownable = Ownable::new(admin());
        let result = ownable.transfer_ownership(&admin(), Address::ZERO);
        assert!(matches!(result, Err(DistributorError::InvalidOwner(_))));
        assert_eq!(ownable.current_administrator(), admin());
    }
}
