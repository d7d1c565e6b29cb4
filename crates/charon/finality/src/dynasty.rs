//! Dynasty accounting: validator-set generations and their deposit totals

use charon_fixed::Decimal;
use std::collections::HashMap;

/// Dynasty ledger: the generation counter, the scaled deposit totals of the
/// two live electorates, and the schedule of future deposit deltas.
///
/// Tables are append-only and keyed by dynasty or epoch number; history is
/// never reclaimed.
#[derive(Debug, Clone, Default)]
pub struct DynastyLedger {
    dynasty: u64,
    total_curdyn_deposits: Decimal,
    total_prevdyn_deposits: Decimal,
    wei_delta: HashMap<u64, Decimal>,
    start_epoch: HashMap<u64, u64>,
    in_epoch: HashMap<u64, u64>,
}

impl DynastyLedger {
    /// Create a ledger at dynasty 0 with no deposits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current dynasty number.
    pub fn dynasty(&self) -> u64 {
        self.dynasty
    }

    /// Scaled deposit total of the current-dynasty electorate.
    pub fn total_curdyn_deposits(&self) -> Decimal {
        self.total_curdyn_deposits
    }

    /// Scaled deposit total of the previous-dynasty electorate.
    pub fn total_prevdyn_deposits(&self) -> Decimal {
        self.total_prevdyn_deposits
    }

    /// Whether both electorates are funded.
    pub fn deposit_exists(&self) -> bool {
        self.total_curdyn_deposits.is_positive() && self.total_prevdyn_deposits.is_positive()
    }

    /// Scheduled deposit delta for the moment `dynasty` becomes current.
    pub fn delta(&self, dynasty: u64) -> Decimal {
        self.wei_delta.get(&dynasty).copied().unwrap_or_default()
    }

    /// Add `delta` to the adjustment applied when `dynasty` becomes
    /// current.
    pub fn schedule_delta(&mut self, dynasty: u64, delta: Decimal) {
        *self.wei_delta.entry(dynasty).or_default() += delta;
    }

    /// Credit a reward to the totals of each electorate the validator
    /// belongs to.
    pub fn credit(&mut self, in_current: bool, in_previous: bool, amount: Decimal) {
        if in_current {
            self.total_curdyn_deposits += amount;
        }
        if in_previous {
            self.total_prevdyn_deposits += amount;
        }
    }

    /// Epoch at which `dynasty` became current (0 if it never has).
    pub fn start_epoch(&self, dynasty: u64) -> u64 {
        self.start_epoch.get(&dynasty).copied().unwrap_or(0)
    }

    /// Dynasty that was current during `epoch`.
    pub fn dynasty_in_epoch(&self, epoch: u64) -> u64 {
        self.in_epoch.get(&epoch).copied().unwrap_or(0)
    }

    /// Advance the dynasty at an epoch boundary.
    ///
    /// The electorates roll only when the checkpoint two epochs back is
    /// finalized; the lag keeps votes already in flight referencing a
    /// stable validator set.
    pub fn increment(&mut self, epoch: u64, two_back_finalized: bool) {
        if two_back_finalized {
            self.dynasty += 1;
            self.total_prevdyn_deposits = self.total_curdyn_deposits;
            self.total_curdyn_deposits += self.delta(self.dynasty);
            self.start_epoch.insert(self.dynasty, epoch);
        }
        self.in_epoch.insert(epoch, self.dynasty);
    }
}
