//! Administrative capability over destroyed deposits
//!
//! Slashed deposits accumulate in the gadget until the owner sweeps them.
//! This is a deliberately narrow testing affordance: the capability is held
//! by a single address fixed at construction and can be transferred or
//! burned (by transferring to the zero address), never silently exercised.

use crate::error::FinalityError;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Policy guarding the destroyed-deposit sweep and ownership transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPolicy {
    owner: Address,
}

impl AdminPolicy {
    /// Policy held by `owner`.
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    /// Current capability holder.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Err unless `caller` holds the capability.
    pub fn authorize(&self, caller: Address) -> Result<(), FinalityError> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(FinalityError::UnauthorizedOwnerChange(caller))
        }
    }

    /// Hand the capability to `new_owner`.
    pub fn transfer(&mut self, caller: Address, new_owner: Address) -> Result<(), FinalityError> {
        self.authorize(caller)?;
        self.owner = new_owner;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization() {
        let owner = Address::repeat_byte(1);
        let stranger = Address::repeat_byte(2);
        let policy = AdminPolicy::new(owner);

        assert!(policy.authorize(owner).is_ok());
        assert_eq!(
            policy.authorize(stranger),
            Err(FinalityError::UnauthorizedOwnerChange(stranger))
        );
    }

    #[test]
    fn test_transfer_and_burn() {
        let owner = Address::repeat_byte(1);
        let next = Address::repeat_byte(2);
        let mut policy = AdminPolicy::new(owner);

        assert!(policy.transfer(next, next).is_err());
        policy.transfer(owner, next).unwrap();
        assert_eq!(policy.owner(), next);
        assert!(policy.authorize(owner).is_err());

        // burning the capability locks everyone out
        policy.transfer(next, Address::ZERO).unwrap();
        assert!(policy.authorize(next).is_err());
    }
}
