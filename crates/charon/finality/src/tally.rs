//! Per-target-epoch vote accounting

use crate::bitset::VoteBitmap;
use charon_fixed::Decimal;
use std::collections::HashMap;

/// Vote record for one target epoch.
///
/// Weighted accumulators are split by the source epoch the vote cited and
/// by electorate; the attendance bitmap is source-independent. The
/// justification flags are monotonic: there is no API to clear them.
#[derive(Debug, Clone, Default)]
struct EpochVotes {
    cur_dyn_votes: HashMap<u64, Decimal>,
    prev_dyn_votes: HashMap<u64, Decimal>,
    bitmap: VoteBitmap,
    is_justified: bool,
    is_finalized: bool,
}

/// Vote records for every target epoch ever voted on or checkpointed.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    records: HashMap<u64, EpochVotes>,
}

impl VoteTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the validator's attendance bit is set for `target_epoch`.
    pub fn has_voted(&self, target_epoch: u64, index: u64) -> bool {
        self.records.get(&target_epoch).is_some_and(|r| r.bitmap.get(index))
    }

    /// Set the validator's attendance bit for `target_epoch`.
    pub fn mark_voted(&mut self, target_epoch: u64, index: u64) {
        self.records.entry(target_epoch).or_default().bitmap.set(index);
    }

    /// Accumulate a deposit-weighted vote into each electorate the voter
    /// belongs to, returning the fresh `(current, previous)` totals for the
    /// cited source epoch.
    pub fn accumulate(
        &mut self,
        target_epoch: u64,
        source_epoch: u64,
        in_current: bool,
        in_previous: bool,
        deposit: Decimal,
    ) -> (Decimal, Decimal) {
        let record = self.records.entry(target_epoch).or_default();
        if in_current {
            *record.cur_dyn_votes.entry(source_epoch).or_default() += deposit;
        }
        if in_previous {
            *record.prev_dyn_votes.entry(source_epoch).or_default() += deposit;
        }
        (
            record.cur_dyn_votes.get(&source_epoch).copied().unwrap_or_default(),
            record.prev_dyn_votes.get(&source_epoch).copied().unwrap_or_default(),
        )
    }

    /// Current-dynasty vote weight for `(target_epoch, source_epoch)`.
    pub fn cur_dyn_votes(&self, target_epoch: u64, source_epoch: u64) -> Decimal {
        self.records
            .get(&target_epoch)
            .and_then(|r| r.cur_dyn_votes.get(&source_epoch))
            .copied()
            .unwrap_or_default()
    }

    /// Previous-dynasty vote weight for `(target_epoch, source_epoch)`.
    pub fn prev_dyn_votes(&self, target_epoch: u64, source_epoch: u64) -> Decimal {
        self.records
            .get(&target_epoch)
            .and_then(|r| r.prev_dyn_votes.get(&source_epoch))
            .copied()
            .unwrap_or_default()
    }

    /// Whether `epoch` is justified.
    pub fn is_justified(&self, epoch: u64) -> bool {
        self.records.get(&epoch).is_some_and(|r| r.is_justified)
    }

    /// Whether `epoch` is finalized.
    pub fn is_finalized(&self, epoch: u64) -> bool {
        self.records.get(&epoch).is_some_and(|r| r.is_finalized)
    }

    /// Mark `epoch` justified.
    pub fn mark_justified(&mut self, epoch: u64) {
        self.records.entry(epoch).or_default().is_justified = true;
    }

    /// Mark `epoch` finalized.
    pub fn mark_finalized(&mut self, epoch: u64) {
        self.records.entry(epoch).or_default().is_finalized = true;
    }
}
