//! Charon bonded-validator finality gadget
//!
//! This crate implements a Casper-style friendly finality gadget: a voting
//! overlay that layers economic finality on top of an underlying block
//! producer. Bonded validators vote once per epoch on a checkpoint hash;
//! supermajority agreement from two overlapping validator generations
//! justifies and finalizes checkpoints, timely votes earn interest through
//! deposit-unit revaluation, and provable equivocation destroys the
//! offender's bond.
//!
//! # Architecture
//!
//! ```text
//! deposit/logout/withdraw ──▶ ValidatorRegistry ─┐
//!                                                 │ deposits, membership
//! epoch boundary ──▶ RewardEngine ──▶ DynastyLedger
//!                        │                        │ totals, thresholds
//! vote ──────────────────┴──────────▶ VoteTally ──┴──▶ justify / finalize
//!
//! slash(evidence) ──▶ double/surround detection ──▶ deposit destruction
//! ```
//!
//! The [`FinalityGadget`] struct owns every component; all transitions are
//! synchronous methods, serialized and authenticated by the embedding
//! environment through the [`Host`] trait.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod admin;
pub mod bitset;
pub mod dynasty;
pub mod error;
pub mod events;
pub mod gadget;
pub mod host;
pub mod reward;
pub mod slashing;
pub mod tally;
pub mod validator;

pub use admin::AdminPolicy;
pub use bitset::VoteBitmap;
pub use dynasty::DynastyLedger;
pub use error::FinalityError;
pub use events::FinalityEvent;
pub use gadget::{FinalityConfig, FinalityGadget};
pub use host::Host;
pub use reward::RewardEngine;
pub use slashing::{SignedVote, SlashingViolation, detect_violation};
pub use tally::VoteTally;
pub use validator::{SENTINEL_END_DYNASTY, Validator, ValidatorRegistry};

/// Protocol constants
pub mod config {
    /// Blocks per epoch
    pub const DEFAULT_EPOCH_LENGTH: u64 = 50;

    /// Epochs between a validator's exit dynasty and withdrawability
    pub const DEFAULT_WITHDRAWAL_DELAY: u64 = 15_000;

    /// Dynasties between a logout announcement and the exit itself
    pub const DEFAULT_DYNASTY_LOGOUT_DELAY: u64 = 700;

    /// Minimum bond if no one else is validating (in wei)
    /// 1,500 ether = 1_500 * 10^18 wei
    pub const DEFAULT_MIN_DEPOSIT_SIZE: u128 = 1_500_000_000_000_000_000_000;

    /// Divisor for the slashing finder's fee (4%)
    pub const SLASH_BOUNTY_DIVISOR: u64 = 25;

    /// Divisor for the proposer's share of a vote reward
    pub const PROPOSER_REWARD_DIVISOR: u64 = 8;
}
