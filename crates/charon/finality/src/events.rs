//! Typed events recorded by successful transitions
//!
//! The withdrawal address identifies a validator across its whole lifecycle;
//! the numeric index stops resolving once the record is deleted.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Journal entry appended by a successful state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalityEvent {
    /// A new validator bonded a deposit
    Deposit {
        /// Address the bond will be paid out to
        withdrawal_addr: Address,
        /// Allocated validator index
        index: u64,
        /// Address vote signatures must verify against
        verification_addr: Address,
        /// First dynasty of membership
        start_dynasty: u64,
        /// Bonded amount in wei
        amount: U256,
    },

    /// A vote was accepted into the tally
    Vote {
        /// Voting validator's withdrawal address
        withdrawal_addr: Address,
        /// Voting validator's index
        index: u64,
        /// Checkpoint hash voted for
        target_hash: B256,
        /// Epoch of the checkpoint
        target_epoch: u64,
        /// Justified epoch the vote links back to
        source_epoch: u64,
    },

    /// A validator announced a voluntary exit
    Logout {
        /// Validator's withdrawal address
        withdrawal_addr: Address,
        /// Validator index
        index: u64,
        /// First dynasty the validator is no longer part of
        end_dynasty: u64,
    },

    /// An exited validator's bond was paid out
    Withdraw {
        /// Recipient of the payout
        withdrawal_addr: Address,
        /// Former validator index
        index: u64,
        /// Paid amount in wei
        amount: U256,
    },

    /// A validator was slashed for provable equivocation
    Slash {
        /// Submitter of the evidence, receiver of the bounty
        caller: Address,
        /// Offender's withdrawal address
        offender: Address,
        /// Offender's index
        index: u64,
        /// Finder's fee in wei
        bounty: U256,
        /// Destroyed amount in wei
        destroyed: U256,
    },

    /// An epoch checkpoint changed status
    Epoch {
        /// Epoch number
        number: u64,
        /// Canonical checkpoint hash
        checkpoint_hash: B256,
        /// Whether the checkpoint is justified
        is_justified: bool,
        /// Whether the checkpoint is finalized
        is_finalized: bool,
    },
}
