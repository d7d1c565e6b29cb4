//! Deposit scale factors and the reward recurrence
//!
//! Rewards and non-voting penalties are applied purely through unit
//! revaluation: each epoch the deposit scale factor is multiplied by the
//! non-voter rescale, so voters credited with fresh units keep pace while
//! non-voters' relative share shrinks.

use charon_fixed::{Decimal, sqrt};
use std::collections::HashMap;

/// Wei per ether, used to express deposit totals in whole ether for the
/// interest-rate square root.
const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

/// Initial deposit scale factor; large so early-epoch arithmetic keeps
/// precision.
pub const INITIAL_SCALE_FACTOR: u64 = 10_000_000_000;

/// Per-epoch deposit scale factors and the reward factor recurrence.
///
/// Scale factors are append-only: once an epoch's factor is recorded it is
/// never altered.
#[derive(Debug, Clone)]
pub struct RewardEngine {
    scale_factor: HashMap<u64, Decimal>,
    reward_factor: Decimal,
    last_voter_rescale: Decimal,
    last_nonvoter_rescale: Decimal,
}

impl RewardEngine {
    /// Engine with the scale factor seeded at `genesis_epoch`.
    pub fn new(genesis_epoch: u64) -> Self {
        let mut scale_factor = HashMap::new();
        scale_factor.insert(genesis_epoch, Decimal::from_int(INITIAL_SCALE_FACTOR));
        Self {
            scale_factor,
            reward_factor: Decimal::ZERO,
            last_voter_rescale: Decimal::ZERO,
            last_nonvoter_rescale: Decimal::ZERO,
        }
    }

    /// Scale factor recorded for `epoch` (zero if never initialized).
    pub fn scale_factor(&self, epoch: u64) -> Decimal {
        self.scale_factor.get(&epoch).copied().unwrap_or_default()
    }

    /// Reward paid per unit of deposit for a timely correct vote.
    pub fn reward_factor(&self) -> Decimal {
        self.reward_factor
    }

    /// Rescale applied to voters at the last epoch boundary.
    pub fn last_voter_rescale(&self) -> Decimal {
        self.last_voter_rescale
    }

    /// Rescale applied to the deposit unit at the last epoch boundary.
    pub fn last_nonvoter_rescale(&self) -> Decimal {
        self.last_nonvoter_rescale
    }

    /// Roll the scale factor into `epoch`.
    ///
    /// Voters are rescaled by `1 + collective_reward`; the unit itself by
    /// that over `1 + reward_factor`, which dilutes whoever did not vote.
    pub fn rescale(&mut self, epoch: u64, collective_reward: Decimal) {
        self.last_voter_rescale = Decimal::ONE + collective_reward;
        self.last_nonvoter_rescale =
            self.last_voter_rescale / (Decimal::ONE + self.reward_factor);
        let rolled = self.scale_factor(epoch - 1) * self.last_nonvoter_rescale;
        self.scale_factor.insert(epoch, rolled);
    }

    /// Install the reward factor for the epoch being initialized.
    pub fn set_reward_factor(&mut self, reward_factor: Decimal) {
        self.reward_factor = reward_factor;
    }

    /// Candidate reward factor: interest shrinking with the square root of
    /// total deposits, plus a penalty escalating with finality delay.
    pub fn next_reward_factor(
        base_interest_factor: Decimal,
        base_penalty_factor: Decimal,
        sqrt_total: Decimal,
        esf: u64,
    ) -> Decimal {
        base_interest_factor / sqrt_total + base_penalty_factor * esf.saturating_sub(2)
    }

    /// Square root of the larger electorate's deposits expressed in whole
    /// ether (never below one), at the previous epoch's scale factor.
    pub fn sqrt_of_total_deposits(&self, epoch: u64, total: Decimal) -> Decimal {
        let ether = (total * self.scale_factor(epoch - 1) / WEI_PER_ETHER).trunc() + Decimal::ONE;
        sqrt(ether)
    }
}
