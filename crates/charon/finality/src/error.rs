//! Finality gadget error types

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

/// Precondition violations that abort a requested transition.
///
/// Every failure leaves the gadget untouched; callers retry with corrected
/// inputs or abandon the transition. Events are emitted only on success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinalityError {
    /// Gadget's epoch view is behind the chain clock
    #[error("stale epoch view: gadget at epoch {current}, clock at epoch {clock}")]
    EpochStale {
        /// Epoch the gadget last initialized
        current: u64,
        /// Epoch implied by the host's block number
        clock: u64,
    },

    /// Requested epoch lies in the future
    #[error("epoch {requested} is ahead of current epoch {current}")]
    FutureEpoch {
        /// Epoch named by the caller
        requested: u64,
        /// Epoch the gadget is in
        current: u64,
    },

    /// Epoch boundary has not been reached on-chain
    #[error("epoch {requested} has not started: clock is at epoch {clock}")]
    EpochNotYetReached {
        /// Epoch named by the caller
        requested: u64,
        /// Epoch implied by the host's block number
        clock: u64,
    },

    /// Epoch initialization must advance by exactly one
    #[error("non-sequential epoch {requested}, expected {expected}")]
    NonSequentialEpoch {
        /// Epoch named by the caller
        requested: u64,
        /// The only epoch the gadget will accept
        expected: u64,
    },

    /// Withdrawal address already bound to a live validator
    #[error("withdrawal address {0} already in use")]
    DuplicateWithdrawalAddress(Address),

    /// Verification code rejected by the purity checker
    #[error("verification code at {0} rejected by purity check")]
    InvalidVerificationCode(Address),

    /// Deposit below the configured minimum
    #[error("deposit of {amount} wei below minimum {minimum} wei")]
    DepositTooSmall {
        /// Offered amount
        amount: U256,
        /// Configured minimum
        minimum: U256,
    },

    /// No validator at the given index
    #[error("unknown validator index {0}")]
    UnknownValidator(u64),

    /// Validator has already announced an exit at or before this dynasty
    #[error("validator {index} already logging out at dynasty {end_dynasty}")]
    AlreadyLoggingOut {
        /// Validator index
        index: u64,
        /// Previously recorded exit dynasty
        end_dynasty: u64,
    },

    /// Validator's exit dynasty has not yet passed
    #[error("validator {index} not withdrawable: exits at dynasty {end_dynasty}, current dynasty {dynasty}")]
    NotYetEligible {
        /// Validator index
        index: u64,
        /// Recorded exit dynasty
        end_dynasty: u64,
        /// Current dynasty
        dynasty: u64,
    },

    /// Withdrawal delay still running
    #[error("withdrawal delay not elapsed: eligible at epoch {eligible_epoch}, current epoch {current}")]
    WithdrawalDelayNotElapsed {
        /// First epoch the withdrawal will be accepted
        eligible_epoch: u64,
        /// Current epoch
        current: u64,
    },

    /// Validator already voted for this target epoch
    #[error("validator {index} already voted for target epoch {target_epoch}")]
    ReplayedVote {
        /// Validator index
        index: u64,
        /// Target epoch of the duplicate vote
        target_epoch: u64,
    },

    /// Vote names a non-canonical checkpoint hash
    #[error("wrong target hash {got}, expected {expected}")]
    WrongTargetHash {
        /// Canonical checkpoint hash for the current epoch
        expected: B256,
        /// Hash the vote carried
        got: B256,
    },

    /// Vote targets an epoch other than the current one
    #[error("wrong target epoch {got}, expected {expected}")]
    WrongTargetEpoch {
        /// The current epoch
        expected: u64,
        /// Epoch the vote carried
        got: u64,
    },

    /// Vote's source epoch is not justified
    #[error("source epoch {0} is not justified")]
    UnjustifiedSource(u64),

    /// Validator belongs to neither the current nor the previous dynasty
    #[error("validator {index} not eligible to vote in dynasty {dynasty}")]
    IneligibleValidator {
        /// Validator index
        index: u64,
        /// Current dynasty
        dynasty: u64,
    },

    /// A slashing message fails signature verification, or the two messages
    /// name different validators
    #[error("invalid vote message signature")]
    InvalidSignature,

    /// Both slashing messages are the same message
    #[error("slashing evidence messages are identical")]
    SameMessage,

    /// The two votes exhibit neither a double vote nor a surround vote
    #[error("no slashable violation between the two vote messages")]
    NoSlashableViolation,

    /// Slashing evidence failed to decode
    #[error("malformed vote message: {0}")]
    MalformedVoteMessage(#[from] alloy_rlp::Error),

    /// Reward factor recurrence left the positive range
    #[error("reward factor must be strictly positive")]
    NonPositiveRewardFactor,

    /// Caller does not hold the owner capability
    #[error("caller {0} is not the owner")]
    UnauthorizedOwnerChange(Address),

    /// Host refused a value transfer
    #[error("transfer of {amount} wei to {to} failed")]
    TransferFailed {
        /// Intended recipient
        to: Address,
        /// Amount in wei
        amount: U256,
    },
}
