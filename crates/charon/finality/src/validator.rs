//! Bonded validator records and the registry that owns them

use alloy_primitives::Address;
use charon_fixed::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `end_dynasty` value meaning the validator has not announced an exit.
pub const SENTINEL_END_DYNASTY: u64 = u64::MAX;

/// A bonded validator.
///
/// `deposit` is held in scaled units; multiply by the epoch's deposit scale
/// factor for the absolute wei amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Scaled deposit
    pub deposit: Decimal,
    /// First dynasty the validator is part of
    pub start_dynasty: u64,
    /// First dynasty the validator is no longer part of
    pub end_dynasty: u64,
    /// Address the validator's vote signatures must verify against
    pub addr: Address,
    /// Address the bond is paid out to
    pub withdrawal_addr: Address,
}

impl Validator {
    /// Whether the validator belongs to the electorate of `dynasty`.
    pub fn in_dynasty(&self, dynasty: u64) -> bool {
        self.start_dynasty <= dynasty && dynasty < self.end_dynasty
    }

    /// Whether a logout has been staged.
    pub fn is_logging_out(&self) -> bool {
        self.end_dynasty != SENTINEL_END_DYNASTY
    }
}

/// Table of bonded validators with a withdrawal-address reverse index.
///
/// Indices are allocated monotonically starting at 1; index 0 is never
/// used. The reverse index enforces at most one live validator per
/// withdrawal address.
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    validators: HashMap<u64, Validator>,
    index_by_withdrawal: HashMap<Address, u64>,
    next_index: u64,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
            index_by_withdrawal: HashMap::new(),
            next_index: 1,
        }
    }

    /// Register a new validator, returning its index.
    pub fn insert(&mut self, validator: Validator) -> u64 {
        let index = self.next_index;
        self.index_by_withdrawal.insert(validator.withdrawal_addr, index);
        self.validators.insert(index, validator);
        self.next_index += 1;
        index
    }

    /// Look up a validator by index.
    pub fn get(&self, index: u64) -> Option<&Validator> {
        self.validators.get(&index)
    }

    /// Mutable lookup by index.
    pub fn get_mut(&mut self, index: u64) -> Option<&mut Validator> {
        self.validators.get_mut(&index)
    }

    /// Live index bound to a withdrawal address, if any.
    pub fn index_of(&self, withdrawal_addr: &Address) -> Option<u64> {
        self.index_by_withdrawal.get(withdrawal_addr).copied()
    }

    /// Remove a validator record and free its reverse-index entry.
    /// Idempotent.
    pub fn delete(&mut self, index: u64) {
        if let Some(validator) = self.validators.remove(&index) {
            self.index_by_withdrawal.remove(&validator.withdrawal_addr);
        }
    }

    /// Number of live validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether no validators are bonded.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Index the next deposit will receive.
    pub fn next_validator_index(&self) -> u64 {
        self.next_index
    }
}
