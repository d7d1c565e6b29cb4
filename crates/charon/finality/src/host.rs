//! Host environment boundary
//!
//! The gadget performs no cryptography, block-hash lookups or value
//! transfers of its own; the embedding ledger provides those capabilities
//! through this trait. Calls into the host never re-enter the gadget's
//! mutable state: every operation finishes its bookkeeping before invoking
//! [`Host::pay`].

use alloy_primitives::{Address, B256, U256};

/// External capabilities provided by the embedding environment.
///
/// `vote` and `logout` arrive as direct typed calls and are assumed already
/// authenticated by the caller; only `slash` verifies standalone signed
/// messages through [`Host::verify_signature`].
pub trait Host {
    /// Current chain height, the clock for epoch accounting.
    fn block_number(&self) -> u64;

    /// Canonical hash of the given block, `B256::ZERO` if unknown.
    fn block_hash(&self, number: u64) -> B256;

    /// Verify `signature` over `sighash` against a validator's registered
    /// verification address.
    fn verify_signature(&self, sighash: B256, signature: &[u8], addr: Address) -> bool;

    /// Static purity check of deposited verification code.
    fn is_pure(&self, addr: Address) -> bool;

    /// Transfer `amount` wei to `to`, returning whether the transfer was
    /// accepted. Hosts should make this an infallible internal credit; a
    /// `false` surfaces as [`TransferFailed`](crate::FinalityError) after
    /// the transition's bookkeeping has already committed.
    fn pay(&mut self, to: Address, amount: U256) -> bool;

    /// Proposer of the current block, receiver of vote inclusion
    /// incentives.
    fn proposer(&self) -> Address;
}
