//! The finality gadget state machine
//!
//! One explicit top-level struct owns every component and all global
//! checkpoint scalars. Transitions are synchronous methods serialized by
//! the embedding environment; every precondition is checked before the
//! first mutation, so a failed call leaves no trace.

use alloy_primitives::{Address, B256, U256};
use charon_fixed::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::{
    admin::AdminPolicy,
    config,
    dynasty::DynastyLedger,
    error::FinalityError,
    events::FinalityEvent,
    host::Host,
    reward::RewardEngine,
    slashing::{SignedVote, detect_violation},
    tally::VoteTally,
    validator::{SENTINEL_END_DYNASTY, Validator, ValidatorRegistry},
};

/// Construction-time parameters, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityConfig {
    /// Blocks per epoch
    pub epoch_length: u64,
    /// Epochs between a validator's exit dynasty and withdrawability
    pub withdrawal_delay: u64,
    /// Dynasties between a logout announcement and the exit itself
    pub dynasty_logout_delay: u64,
    /// Interest numerator of the reward factor recurrence
    pub base_interest_factor: Decimal,
    /// Penalty escalation per epoch of finality delay
    pub base_penalty_factor: Decimal,
    /// Smallest accepted bond in wei
    pub min_deposit_size: U256,
    /// Holder of the destroyed-deposit sweep capability
    pub owner: Address,
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            epoch_length: config::DEFAULT_EPOCH_LENGTH,
            withdrawal_delay: config::DEFAULT_WITHDRAWAL_DELAY,
            dynasty_logout_delay: config::DEFAULT_DYNASTY_LOGOUT_DELAY,
            base_interest_factor: Decimal::ratio(7, 1000),
            base_penalty_factor: Decimal::ratio(2, 10_000_000),
            min_deposit_size: U256::from(config::DEFAULT_MIN_DEPOSIT_SIZE),
            owner: Address::ZERO,
        }
    }
}

/// The authoritative finality state machine.
///
/// Owns the validator registry, dynasty ledger, vote tally and reward
/// engine plus the global checkpoint scalars. The embedding environment
/// drives it through [`Host`] and reads back typed events from the
/// journal.
#[derive(Debug)]
pub struct FinalityGadget<H: Host> {
    config: FinalityConfig,
    host: H,
    registry: ValidatorRegistry,
    dynasties: DynastyLedger,
    tally: VoteTally,
    rewards: RewardEngine,
    admin: AdminPolicy,

    current_epoch: u64,
    last_justified_epoch: u64,
    last_finalized_epoch: u64,
    expected_source_epoch: u64,
    main_hash_justified: bool,
    total_destroyed: U256,
    checkpoint_hashes: HashMap<u64, B256>,
    events: Vec<FinalityEvent>,
}

impl<H: Host> FinalityGadget<H> {
    /// Create a gadget anchored at the host's current epoch.
    pub fn new(config: FinalityConfig, host: H) -> Self {
        let current_epoch = host.block_number() / config.epoch_length;
        let admin = AdminPolicy::new(config.owner);
        Self {
            rewards: RewardEngine::new(current_epoch),
            registry: ValidatorRegistry::new(),
            dynasties: DynastyLedger::new(),
            tally: VoteTally::new(),
            admin,
            host,
            config,
            current_epoch,
            last_justified_epoch: 0,
            last_finalized_epoch: 0,
            expected_source_epoch: 0,
            main_hash_justified: false,
            total_destroyed: U256::ZERO,
            checkpoint_hashes: HashMap::new(),
            events: Vec::new(),
        }
    }

    // ----- epoch boundary -----

    /// Advance the gadget into `epoch`.
    ///
    /// Must be called exactly once per epoch boundary with
    /// `current_epoch + 1`; any other argument is rejected without side
    /// effects, so callers retry with the correct next epoch rather than
    /// assuming partial progress.
    pub fn initialize_epoch(&mut self, epoch: u64) -> Result<(), FinalityError> {
        let clock = self.clock_epoch();
        if epoch > clock {
            return Err(FinalityError::EpochNotYetReached { requested: epoch, clock });
        }
        if epoch != self.current_epoch + 1 {
            return Err(FinalityError::NonSequentialEpoch {
                requested: epoch,
                expected: self.current_epoch + 1,
            });
        }

        // Validate the reward factor recurrence before mutating anything.
        let funded = self.dynasties.deposit_exists();
        let next_reward_factor = if funded {
            let total = self
                .dynasties
                .total_curdyn_deposits()
                .max(self.dynasties.total_prevdyn_deposits());
            let sqrt_total = self.rewards.sqrt_of_total_deposits(epoch, total);
            let esf = epoch - self.last_finalized_epoch;
            let factor = RewardEngine::next_reward_factor(
                self.config.base_interest_factor,
                self.config.base_penalty_factor,
                sqrt_total,
                esf,
            );
            if !factor.is_positive() {
                return Err(FinalityError::NonPositiveRewardFactor);
            }
            factor
        } else {
            Decimal::ZERO
        };

        self.current_epoch = epoch;

        let collective = self.collective_reward();
        self.rewards.rescale(epoch, collective);

        if funded {
            self.rewards.set_reward_factor(next_reward_factor);
        } else {
            // Before the first deposits exist, epochs finalize instantly.
            self.insta_finalize();
            self.rewards.set_reward_factor(Decimal::ZERO);
        }

        let two_back_finalized =
            epoch.checked_sub(2).is_some_and(|e| self.tally.is_finalized(e));
        self.dynasties.increment(epoch, two_back_finalized);
        if self.main_hash_justified {
            self.expected_source_epoch = epoch - 1;
        }
        self.main_hash_justified = false;

        let checkpoint = self.recommended_target_hash();
        self.checkpoint_hashes.insert(epoch, checkpoint);
        info!(
            target: "charon::gadget",
            epoch,
            dynasty = self.dynasties.dynasty(),
            %checkpoint,
            "epoch initialized"
        );
        self.events.push(FinalityEvent::Epoch {
            number: epoch,
            checkpoint_hash: checkpoint,
            is_justified: false,
            is_finalized: false,
        });
        Ok(())
    }

    // ----- validator lifecycle -----

    /// Bond a new validator, returning its index.
    ///
    /// Activation lags by two dynasties so votes already in flight keep a
    /// stable electorate.
    pub fn deposit(
        &mut self,
        verification_addr: Address,
        withdrawal_addr: Address,
        amount: U256,
    ) -> Result<u64, FinalityError> {
        self.require_current_epoch()?;
        if !self.host.is_pure(verification_addr) {
            return Err(FinalityError::InvalidVerificationCode(verification_addr));
        }
        if self.registry.index_of(&withdrawal_addr).is_some() {
            return Err(FinalityError::DuplicateWithdrawalAddress(withdrawal_addr));
        }
        if amount < self.config.min_deposit_size {
            return Err(FinalityError::DepositTooSmall {
                amount,
                minimum: self.config.min_deposit_size,
            });
        }

        let start_dynasty = self.dynasties.dynasty() + 2;
        let scaled = Decimal::from_wei(amount) / self.rewards.scale_factor(self.current_epoch);
        let index = self.registry.insert(Validator {
            deposit: scaled,
            start_dynasty,
            end_dynasty: SENTINEL_END_DYNASTY,
            addr: verification_addr,
            withdrawal_addr,
        });
        self.dynasties.schedule_delta(start_dynasty, scaled);

        info!(
            target: "charon::gadget",
            index,
            %withdrawal_addr,
            start_dynasty,
            %amount,
            "validator bonded"
        );
        self.events.push(FinalityEvent::Deposit {
            withdrawal_addr,
            index,
            verification_addr,
            start_dynasty,
            amount,
        });
        Ok(index)
    }

    /// Announce a voluntary exit, effective after the logout delay.
    pub fn logout(&mut self, validator_index: u64, epoch: u64) -> Result<(), FinalityError> {
        self.require_current_epoch()?;
        if epoch > self.current_epoch {
            return Err(FinalityError::FutureEpoch { requested: epoch, current: self.current_epoch });
        }
        let end_dynasty = self.dynasties.dynasty() + self.config.dynasty_logout_delay;
        let Some(validator) = self.registry.get_mut(validator_index) else {
            return Err(FinalityError::UnknownValidator(validator_index));
        };
        if validator.end_dynasty <= end_dynasty {
            return Err(FinalityError::AlreadyLoggingOut {
                index: validator_index,
                end_dynasty: validator.end_dynasty,
            });
        }

        validator.end_dynasty = end_dynasty;
        let deposit = validator.deposit;
        let withdrawal_addr = validator.withdrawal_addr;
        self.dynasties.schedule_delta(end_dynasty, -deposit);

        info!(target: "charon::gadget", index = validator_index, end_dynasty, "validator logging out");
        self.events.push(FinalityEvent::Logout {
            withdrawal_addr,
            index: validator_index,
            end_dynasty,
        });
        Ok(())
    }

    /// Pay out a fully exited validator's bond and delete the record.
    pub fn withdraw(&mut self, validator_index: u64) -> Result<(), FinalityError> {
        let Some(validator) = self.registry.get(validator_index) else {
            return Err(FinalityError::UnknownValidator(validator_index));
        };
        let dynasty = self.dynasties.dynasty();
        if dynasty <= validator.end_dynasty {
            return Err(FinalityError::NotYetEligible {
                index: validator_index,
                end_dynasty: validator.end_dynasty,
                dynasty,
            });
        }
        let exit_epoch = self.dynasties.start_epoch(validator.end_dynasty + 1);
        let eligible_epoch = exit_epoch + self.config.withdrawal_delay;
        if self.current_epoch < eligible_epoch {
            return Err(FinalityError::WithdrawalDelayNotElapsed {
                eligible_epoch,
                current: self.current_epoch,
            });
        }

        let amount = (validator.deposit * self.rewards.scale_factor(exit_epoch)).floor_u256();
        let withdrawal_addr = validator.withdrawal_addr;

        // Delete before paying; the host never sees a claimable stale bond.
        self.registry.delete(validator_index);
        if !self.host.pay(withdrawal_addr, amount) {
            return Err(FinalityError::TransferFailed { to: withdrawal_addr, amount });
        }

        info!(target: "charon::gadget", index = validator_index, %amount, "validator withdrawn");
        self.events.push(FinalityEvent::Withdraw {
            withdrawal_addr,
            index: validator_index,
            amount,
        });
        Ok(())
    }

    // ----- voting -----

    /// Process a vote for the current epoch's checkpoint.
    pub fn vote(
        &mut self,
        validator_index: u64,
        target_hash: B256,
        target_epoch: u64,
        source_epoch: u64,
    ) -> Result<(), FinalityError> {
        if self.tally.has_voted(target_epoch, validator_index) {
            return Err(FinalityError::ReplayedVote { index: validator_index, target_epoch });
        }
        let expected_hash = self.checkpoint_hash(self.current_epoch);
        if target_hash != expected_hash {
            return Err(FinalityError::WrongTargetHash { expected: expected_hash, got: target_hash });
        }
        if target_epoch != self.current_epoch {
            return Err(FinalityError::WrongTargetEpoch {
                expected: self.current_epoch,
                got: target_epoch,
            });
        }
        if !self.tally.is_justified(source_epoch) {
            return Err(FinalityError::UnjustifiedSource(source_epoch));
        }
        let Some(validator) = self.registry.get(validator_index) else {
            return Err(FinalityError::UnknownValidator(validator_index));
        };
        let dynasty = self.dynasties.dynasty();
        let in_current = validator.in_dynasty(dynasty);
        let in_previous = dynasty > 0 && validator.in_dynasty(dynasty - 1);
        if !in_current && !in_previous {
            return Err(FinalityError::IneligibleValidator { index: validator_index, dynasty });
        }
        let deposit = validator.deposit;
        let withdrawal_addr = validator.withdrawal_addr;

        self.tally.mark_voted(target_epoch, validator_index);
        let (cur_votes, prev_votes) =
            self.tally
                .accumulate(target_epoch, source_epoch, in_current, in_previous, deposit);

        // A timely vote citing the expected source earns interest.
        let mut proposer_fee = U256::ZERO;
        if source_epoch == self.expected_source_epoch {
            let reward = (deposit * self.rewards.reward_factor()).trunc();
            proposer_fee = self.proc_reward(validator_index, reward);
        }

        // Justify once both electorates cross two thirds.
        let cur_threshold = self.dynasties.total_curdyn_deposits() * 2u64 / 3u64;
        let prev_threshold = self.dynasties.total_prevdyn_deposits() * 2u64 / 3u64;
        if cur_votes >= cur_threshold
            && prev_votes >= prev_threshold
            && !self.tally.is_justified(target_epoch)
        {
            self.tally.mark_justified(target_epoch);
            self.last_justified_epoch = target_epoch;
            self.main_hash_justified = true;
            info!(target: "charon::gadget", epoch = target_epoch, "epoch justified");
            self.events.push(FinalityEvent::Epoch {
                number: target_epoch,
                checkpoint_hash: self.checkpoint_hash(target_epoch),
                is_justified: true,
                is_finalized: false,
            });

            // Two consecutively justified epochs finalize the source.
            if target_epoch == source_epoch + 1 {
                self.tally.mark_finalized(source_epoch);
                self.last_finalized_epoch = source_epoch;
                info!(target: "charon::gadget", epoch = source_epoch, "epoch finalized");
                self.events.push(FinalityEvent::Epoch {
                    number: source_epoch,
                    checkpoint_hash: self.checkpoint_hash(source_epoch),
                    is_justified: true,
                    is_finalized: true,
                });
            }
        }

        if !proposer_fee.is_zero() {
            let proposer = self.host.proposer();
            if !self.host.pay(proposer, proposer_fee) {
                return Err(FinalityError::TransferFailed { to: proposer, amount: proposer_fee });
            }
        }

        debug!(
            target: "charon::gadget",
            index = validator_index,
            target_epoch,
            source_epoch,
            "vote recorded"
        );
        self.events.push(FinalityEvent::Vote {
            withdrawal_addr,
            index: validator_index,
            target_hash,
            target_epoch,
            source_epoch,
        });
        Ok(())
    }

    /// Credit a vote reward and return the proposer's inclusion fee in wei.
    fn proc_reward(&mut self, validator_index: u64, reward: Decimal) -> U256 {
        let dynasty = self.dynasties.dynasty();
        let Some(validator) = self.registry.get_mut(validator_index) else {
            return U256::ZERO;
        };
        validator.deposit += reward;
        let in_current = validator.in_dynasty(dynasty);
        let in_previous = dynasty > 0 && validator.in_dynasty(dynasty - 1);
        let logging_out = validator.is_logging_out();
        let end_dynasty = validator.end_dynasty;

        self.dynasties.credit(in_current, in_previous, reward);
        if logging_out {
            // keep the staged exit delta in sync with the grown bond
            self.dynasties.schedule_delta(end_dynasty, -reward);
        }

        (reward * self.rewards.scale_factor(self.current_epoch)
            / config::PROPOSER_REWARD_DIVISOR)
            .floor_u256()
    }

    // ----- slashing -----

    /// Destroy a provably equivocating validator's bond, paying the caller
    /// a finder's fee.
    pub fn slash(
        &mut self,
        caller: Address,
        message_1: &[u8],
        message_2: &[u8],
    ) -> Result<(), FinalityError> {
        let vote_1 = SignedVote::from_rlp(message_1)?;
        let vote_2 = SignedVote::from_rlp(message_2)?;
        if vote_1.validator_index != vote_2.validator_index {
            return Err(FinalityError::InvalidSignature);
        }
        let index = vote_1.validator_index;
        let Some(validator) = self.registry.get(index) else {
            return Err(FinalityError::UnknownValidator(index));
        };
        let sighash_1 = vote_1.sighash();
        let sighash_2 = vote_2.sighash();
        if !self.host.verify_signature(sighash_1, &vote_1.signature, validator.addr)
            || !self.host.verify_signature(sighash_2, &vote_2.signature, validator.addr)
        {
            return Err(FinalityError::InvalidSignature);
        }
        if sighash_1 == sighash_2 {
            return Err(FinalityError::SameMessage);
        }
        let Some(violation) = detect_violation(&vote_1, &vote_2) else {
            return Err(FinalityError::NoSlashableViolation);
        };

        let deposit = validator.deposit;
        let end_dynasty = validator.end_dynasty;
        let withdrawal_addr = validator.withdrawal_addr;

        let deposit_value = self.deposit_size(index);
        let bounty = deposit_value / U256::from(config::SLASH_BOUNTY_DIVISOR);
        let destroyed = deposit_value - bounty;
        self.total_destroyed += destroyed;

        // Remove the offender's weight from the dynasty about to take
        // effect, undoing any staged logout so nothing is removed twice.
        let dynasty = self.dynasties.dynasty();
        if dynasty < end_dynasty {
            self.dynasties.schedule_delta(dynasty + 1, -deposit);
            if end_dynasty != SENTINEL_END_DYNASTY {
                self.dynasties.schedule_delta(end_dynasty, deposit);
            }
        }

        self.registry.delete(index);
        if !self.host.pay(caller, bounty) {
            return Err(FinalityError::TransferFailed { to: caller, amount: bounty });
        }

        info!(
            target: "charon::gadget",
            index,
            ?violation,
            %bounty,
            %destroyed,
            "validator slashed"
        );
        self.events.push(FinalityEvent::Slash {
            caller,
            offender: withdrawal_addr,
            index,
            bounty,
            destroyed,
        });
        Ok(())
    }

    // ----- administration -----

    /// Sweep destroyed deposits to the owner.
    pub fn owner_withdraw(&mut self, caller: Address) -> Result<U256, FinalityError> {
        self.admin.authorize(caller)?;
        let amount = self.total_destroyed;
        self.total_destroyed = U256::ZERO;
        if !self.host.pay(caller, amount) {
            return Err(FinalityError::TransferFailed { to: caller, amount });
        }
        Ok(amount)
    }

    /// Transfer (or burn, via the zero address) the owner capability.
    pub fn change_owner(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), FinalityError> {
        self.admin.transfer(caller, new_owner)
    }

    // ----- accessors -----

    /// Epoch the gadget last initialized.
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    /// Current dynasty.
    pub fn dynasty(&self) -> u64 {
        self.dynasties.dynasty()
    }

    /// Highest justified epoch.
    pub fn last_justified_epoch(&self) -> u64 {
        self.last_justified_epoch
    }

    /// Highest finalized epoch.
    pub fn last_finalized_epoch(&self) -> u64 {
        self.last_finalized_epoch
    }

    /// Source epoch a timely vote should cite.
    pub fn recommended_source_epoch(&self) -> u64 {
        self.expected_source_epoch
    }

    /// Target hash a vote for the current epoch should carry.
    pub fn recommended_target_hash(&self) -> B256 {
        match (self.current_epoch * self.config.epoch_length).checked_sub(1) {
            Some(number) => self.host.block_hash(number),
            None => B256::ZERO,
        }
    }

    /// Checkpoint hash recorded for `epoch`.
    pub fn checkpoint_hash(&self, epoch: u64) -> B256 {
        self.checkpoint_hashes.get(&epoch).copied().unwrap_or(B256::ZERO)
    }

    /// Current reward factor.
    pub fn reward_factor(&self) -> Decimal {
        self.rewards.reward_factor()
    }

    /// Scale factor recorded for `epoch`.
    pub fn scale_factor(&self, epoch: u64) -> Decimal {
        self.rewards.scale_factor(epoch)
    }

    /// Destroyed deposits not yet swept.
    pub fn total_destroyed(&self) -> U256 {
        self.total_destroyed
    }

    /// Look up a live validator.
    pub fn validator(&self, index: u64) -> Option<&Validator> {
        self.registry.get(index)
    }

    /// A validator's absolute bond in wei at the current scale factor.
    pub fn deposit_size(&self, index: u64) -> U256 {
        match self.registry.get(index) {
            Some(validator) => {
                (validator.deposit * self.rewards.scale_factor(self.current_epoch)).floor_u256()
            }
            None => U256::ZERO,
        }
    }

    /// Current-dynasty deposit total in wei.
    pub fn total_curdyn_deposits_scaled(&self) -> U256 {
        (self.dynasties.total_curdyn_deposits()
            * self.rewards.scale_factor(self.current_epoch))
        .floor_u256()
    }

    /// Previous-dynasty deposit total in wei.
    pub fn total_prevdyn_deposits_scaled(&self) -> U256 {
        (self.dynasties.total_prevdyn_deposits()
            * self.rewards.scale_factor(self.current_epoch))
        .floor_u256()
    }

    /// The smaller of the two electorates' participation fractions for the
    /// expected source epoch; zero while either electorate is unfunded.
    pub fn main_hash_voted_frac(&self) -> Decimal {
        if !self.dynasties.deposit_exists() {
            return Decimal::ZERO;
        }
        let cur = self.tally.cur_dyn_votes(self.current_epoch, self.expected_source_epoch)
            / self.dynasties.total_curdyn_deposits();
        let prev = self.tally.prev_dyn_votes(self.current_epoch, self.expected_source_epoch)
            / self.dynasties.total_prevdyn_deposits();
        cur.min(prev)
    }

    /// The host environment.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access, for drivers that own the clock.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Events recorded since the last drain.
    pub fn events(&self) -> &[FinalityEvent] {
        &self.events
    }

    /// Drain the event journal.
    pub fn drain_events(&mut self) -> Vec<FinalityEvent> {
        std::mem::take(&mut self.events)
    }

    // ----- internals -----

    fn clock_epoch(&self) -> u64 {
        self.host.block_number() / self.config.epoch_length
    }

    fn require_current_epoch(&self) -> Result<(), FinalityError> {
        let clock = self.clock_epoch();
        if self.current_epoch == clock {
            Ok(())
        } else {
            Err(FinalityError::EpochStale { current: self.current_epoch, clock })
        }
    }

    fn esf(&self) -> u64 {
        self.current_epoch - self.last_finalized_epoch
    }

    /// Collective reward for the expected-source participation of the
    /// epoch just ended; zero when either electorate is unfunded or
    /// finality is stalled beyond two epochs.
    fn collective_reward(&self) -> Decimal {
        let live = self.esf() <= 2;
        if !self.dynasties.deposit_exists() || !live {
            return Decimal::ZERO;
        }
        let prior = self.current_epoch - 1;
        let cur_frac = self.tally.cur_dyn_votes(prior, self.expected_source_epoch)
            / self.dynasties.total_curdyn_deposits();
        let prev_frac = self.tally.prev_dyn_votes(prior, self.expected_source_epoch)
            / self.dynasties.total_prevdyn_deposits();
        cur_frac.min(prev_frac) * self.rewards.reward_factor() / 2u64
    }

    /// Justify and finalize the epoch that just ended; the bootstrap path
    /// while no deposits exist.
    fn insta_finalize(&mut self) {
        let prior = self.current_epoch - 1;
        self.main_hash_justified = true;
        self.tally.mark_justified(prior);
        self.tally.mark_finalized(prior);
        self.last_justified_epoch = prior;
        self.last_finalized_epoch = prior;
        self.events.push(FinalityEvent::Epoch {
            number: prior,
            checkpoint_hash: self.checkpoint_hash(prior),
            is_justified: true,
            is_finalized: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, keccak256};

    const EPOCH_LENGTH: u64 = 10;

    #[derive(Debug)]
    struct MockHost {
        block_number: u64,
        proposer: Address,
        payments: Vec<(Address, U256)>,
    }

    impl MockHost {
        fn new() -> Self {
            Self {
                block_number: 0,
                proposer: Address::repeat_byte(0xee),
                payments: Vec::new(),
            }
        }

        fn paid_to(&self, addr: Address) -> U256 {
            self.payments
                .iter()
                .filter(|(to, _)| *to == addr)
                .fold(U256::ZERO, |acc, (_, amount)| acc + amount)
        }
    }

    impl Host for MockHost {
        fn block_number(&self) -> u64 {
            self.block_number
        }

        fn block_hash(&self, number: u64) -> B256 {
            keccak256(number.to_be_bytes())
        }

        fn verify_signature(&self, _sighash: B256, signature: &[u8], addr: Address) -> bool {
            signature == addr.as_slice()
        }

        fn is_pure(&self, addr: Address) -> bool {
            addr != Address::ZERO
        }

        fn pay(&mut self, to: Address, amount: U256) -> bool {
            self.payments.push((to, amount));
            true
        }

        fn proposer(&self) -> Address {
            self.proposer
        }
    }

    const OWNER: Address = Address::repeat_byte(0xaa);

    fn test_config() -> FinalityConfig {
        FinalityConfig {
            epoch_length: EPOCH_LENGTH,
            withdrawal_delay: 3,
            dynasty_logout_delay: 2,
            owner: OWNER,
            ..FinalityConfig::default()
        }
    }

    fn new_gadget() -> FinalityGadget<MockHost> {
        FinalityGadget::new(test_config(), MockHost::new())
    }

    fn min_deposit() -> U256 {
        U256::from(config::DEFAULT_MIN_DEPOSIT_SIZE)
    }

    fn verification_addr(seed: u8) -> Address {
        Address::repeat_byte(seed)
    }

    fn withdrawal_addr(seed: u8) -> Address {
        Address::repeat_byte(seed | 0x80)
    }

    fn advance_epoch(gadget: &mut FinalityGadget<MockHost>) {
        let next = gadget.current_epoch() + 1;
        gadget.host_mut().block_number = next * EPOCH_LENGTH;
        gadget.initialize_epoch(next).unwrap();
    }

    fn honest_vote(gadget: &mut FinalityGadget<MockHost>, index: u64) {
        let target_epoch = gadget.current_epoch();
        let target_hash = gadget.checkpoint_hash(target_epoch);
        let source_epoch = gadget.last_justified_epoch();
        gadget.vote(index, target_hash, target_epoch, source_epoch).unwrap();
    }

    /// Deposit one validator at epoch 0 and advance until both electorates
    /// are funded (epoch 5, dynasty 4).
    fn setup_funded_validator() -> (FinalityGadget<MockHost>, u64) {
        let mut gadget = new_gadget();
        let index = gadget
            .deposit(verification_addr(1), withdrawal_addr(1), min_deposit())
            .unwrap();
        for _ in 0..5 {
            advance_epoch(&mut gadget);
        }
        assert!(gadget.reward_factor().is_positive());
        (gadget, index)
    }

    fn signed_vote(index: u64, seed: u8, source_epoch: u64, target_epoch: u64) -> Vec<u8> {
        SignedVote {
            validator_index: index,
            target_hash: B256::repeat_byte(target_epoch as u8),
            target_epoch,
            source_epoch,
            signature: Bytes::copy_from_slice(verification_addr(seed).as_slice()),
        }
        .to_rlp()
    }

    #[test]
    fn test_bootstrap_insta_finalizes() {
        let mut gadget = new_gadget();
        gadget.host_mut().block_number = EPOCH_LENGTH;
        gadget.initialize_epoch(1).unwrap();

        assert_eq!(gadget.current_epoch(), 1);
        assert_eq!(gadget.last_justified_epoch(), 0);
        assert_eq!(gadget.last_finalized_epoch(), 0);
        assert!(gadget.reward_factor().is_zero());

        let events = gadget.drain_events();
        assert!(events.contains(&FinalityEvent::Epoch {
            number: 0,
            checkpoint_hash: B256::ZERO,
            is_justified: true,
            is_finalized: true,
        }));

        // dynasties advance once finalized history is two epochs deep
        advance_epoch(&mut gadget);
        assert_eq!(gadget.dynasty(), 1);
        advance_epoch(&mut gadget);
        assert_eq!(gadget.dynasty(), 2);
    }

    #[test]
    fn test_initialize_epoch_requires_boundary() {
        let mut gadget = new_gadget();
        assert_eq!(
            gadget.initialize_epoch(1),
            Err(FinalityError::EpochNotYetReached { requested: 1, clock: 0 })
        );

        gadget.host_mut().block_number = 2 * EPOCH_LENGTH;
        assert_eq!(
            gadget.initialize_epoch(2),
            Err(FinalityError::NonSequentialEpoch { requested: 2, expected: 1 })
        );
        // rejection is side-effect free; the correct call still lands
        assert_eq!(gadget.current_epoch(), 0);
        gadget.initialize_epoch(1).unwrap();
        gadget.initialize_epoch(2).unwrap();
        assert_eq!(gadget.current_epoch(), 2);
    }

    #[test]
    fn test_deposit_allocates_indices_and_schedules_activation() {
        let mut gadget = new_gadget();
        let a = gadget
            .deposit(verification_addr(1), withdrawal_addr(1), min_deposit())
            .unwrap();
        let b = gadget
            .deposit(verification_addr(2), withdrawal_addr(2), min_deposit())
            .unwrap();
        assert_eq!((a, b), (1, 2));

        let validator = gadget.validator(a).unwrap();
        assert_eq!(validator.start_dynasty, 2);
        assert_eq!(validator.end_dynasty, SENTINEL_END_DYNASTY);
        assert_eq!(gadget.deposit_size(a), min_deposit());
    }

    #[test]
    fn test_deposit_preconditions() {
        let mut gadget = new_gadget();
        assert_eq!(
            gadget.deposit(Address::ZERO, withdrawal_addr(1), min_deposit()),
            Err(FinalityError::InvalidVerificationCode(Address::ZERO))
        );
        assert_eq!(
            gadget.deposit(verification_addr(1), withdrawal_addr(1), min_deposit() - U256::from(1)),
            Err(FinalityError::DepositTooSmall {
                amount: min_deposit() - U256::from(1),
                minimum: min_deposit(),
            })
        );

        gadget.deposit(verification_addr(1), withdrawal_addr(1), min_deposit()).unwrap();
        assert_eq!(
            gadget.deposit(verification_addr(2), withdrawal_addr(1), min_deposit()),
            Err(FinalityError::DuplicateWithdrawalAddress(withdrawal_addr(1)))
        );

        // clock ran ahead of the gadget
        gadget.host_mut().block_number = 2 * EPOCH_LENGTH;
        assert_eq!(
            gadget.deposit(verification_addr(3), withdrawal_addr(3), min_deposit()),
            Err(FinalityError::EpochStale { current: 0, clock: 2 })
        );
    }

    #[test]
    fn test_failed_transition_emits_no_events() {
        let mut gadget = new_gadget();
        gadget.drain_events();
        let _ = gadget.deposit(verification_addr(1), withdrawal_addr(1), U256::from(1));
        assert!(gadget.events().is_empty());
    }

    #[test]
    fn test_activation_waits_two_dynasties() {
        let mut gadget = new_gadget();
        gadget.deposit(verification_addr(1), withdrawal_addr(1), min_deposit()).unwrap();

        // dynasty 2 funds the current electorate, dynasty 3 the previous
        for expected_scaled in [U256::ZERO, U256::ZERO, min_deposit(), min_deposit()] {
            advance_epoch(&mut gadget);
            assert_eq!(gadget.total_curdyn_deposits_scaled(), expected_scaled);
        }
        assert_eq!(gadget.total_prevdyn_deposits_scaled(), min_deposit());
        assert_eq!(gadget.dynasty(), 3);
    }

    #[test]
    fn test_honest_voting_justifies_and_finalizes() {
        let (mut gadget, index) = setup_funded_validator();
        assert_eq!(gadget.current_epoch(), 5);
        assert_eq!(gadget.dynasty(), 4);

        // first real vote: the expected source (4) was never justified, so
        // the vote cites the last justified epoch instead and earns nothing
        honest_vote(&mut gadget, index);
        assert_eq!(gadget.last_justified_epoch(), 5);
        assert_eq!(gadget.last_finalized_epoch(), 3);

        // from here on every vote is timely: justify target, finalize source
        let mut previous_deposit = gadget.validator(index).unwrap().deposit;
        for _ in 0..3 {
            advance_epoch(&mut gadget);
            let epoch = gadget.current_epoch();
            assert_eq!(gadget.recommended_source_epoch(), epoch - 1);
            honest_vote(&mut gadget, index);
            assert_eq!(gadget.last_justified_epoch(), epoch);
            assert_eq!(gadget.last_finalized_epoch(), epoch - 1);

            // timely correct votes grow the bond
            let deposit = gadget.validator(index).unwrap().deposit;
            assert!(deposit > previous_deposit);
            previous_deposit = deposit;
        }

        // the proposer collected inclusion fees along the way
        let proposer = gadget.host().proposer;
        assert!(gadget.host().paid_to(proposer) > U256::ZERO);

        let events = gadget.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            FinalityEvent::Epoch { is_justified: true, is_finalized: true, .. }
        )));
    }

    #[test]
    fn test_scale_factor_constant_while_reward_factor_zero() {
        let mut gadget = new_gadget();
        for epoch in 1..=4 {
            advance_epoch(&mut gadget);
            assert_eq!(gadget.scale_factor(epoch), gadget.scale_factor(epoch - 1));
        }
    }

    #[test]
    fn test_scale_factor_dilutes_under_positive_reward_factor() {
        let (mut gadget, index) = setup_funded_validator();
        honest_vote(&mut gadget, index);
        advance_epoch(&mut gadget);
        let epoch = gadget.current_epoch();
        // the unit devalues so that voters, credited with fresh units,
        // outpace non-voters
        assert!(gadget.scale_factor(epoch) < gadget.scale_factor(epoch - 1));
    }

    #[test]
    fn test_vote_replay_rejected() {
        let (mut gadget, index) = setup_funded_validator();
        honest_vote(&mut gadget, index);

        let target_epoch = gadget.current_epoch();
        let target_hash = gadget.checkpoint_hash(target_epoch);
        let source_epoch = gadget.last_justified_epoch();
        assert_eq!(
            gadget.vote(index, target_hash, target_epoch, source_epoch),
            Err(FinalityError::ReplayedVote { index, target_epoch })
        );
    }

    #[test]
    fn test_vote_preconditions() {
        let (mut gadget, index) = setup_funded_validator();
        let target_epoch = gadget.current_epoch();
        let target_hash = gadget.checkpoint_hash(target_epoch);
        let source_epoch = gadget.last_justified_epoch();

        assert_eq!(
            gadget.vote(index, B256::repeat_byte(0x99), target_epoch, source_epoch),
            Err(FinalityError::WrongTargetHash {
                expected: target_hash,
                got: B256::repeat_byte(0x99),
            })
        );
        assert_eq!(
            gadget.vote(index, target_hash, target_epoch + 1, source_epoch),
            Err(FinalityError::WrongTargetEpoch {
                expected: target_epoch,
                got: target_epoch + 1,
            })
        );
        assert_eq!(
            gadget.vote(index, target_hash, target_epoch, 4),
            Err(FinalityError::UnjustifiedSource(4))
        );
        assert_eq!(
            gadget.vote(99, target_hash, target_epoch, source_epoch),
            Err(FinalityError::UnknownValidator(99))
        );

        // a freshly bonded validator is not in either live electorate yet
        let fresh = gadget
            .deposit(verification_addr(7), withdrawal_addr(7), min_deposit())
            .unwrap();
        assert_eq!(
            gadget.vote(fresh, target_hash, target_epoch, source_epoch),
            Err(FinalityError::IneligibleValidator { index: fresh, dynasty: 4 })
        );
    }

    #[test]
    fn test_vote_tally_is_order_independent() {
        let run = |first: u64, second: u64| {
            let mut gadget = new_gadget();
            gadget.deposit(verification_addr(1), withdrawal_addr(1), min_deposit()).unwrap();
            gadget
                .deposit(verification_addr(2), withdrawal_addr(2), min_deposit() * U256::from(2))
                .unwrap();
            for _ in 0..5 {
                advance_epoch(&mut gadget);
            }
            let target_epoch = gadget.current_epoch();
            let target_hash = gadget.checkpoint_hash(target_epoch);
            let source_epoch = gadget.last_justified_epoch();
            gadget.vote(first, target_hash, target_epoch, source_epoch).unwrap();
            gadget.vote(second, target_hash, target_epoch, source_epoch).unwrap();
            (
                gadget.tally.cur_dyn_votes(target_epoch, source_epoch),
                gadget.tally.prev_dyn_votes(target_epoch, source_epoch),
                gadget.last_justified_epoch(),
                gadget.last_finalized_epoch(),
            )
        };

        let forward = run(1, 2);
        let reverse = run(2, 1);
        assert_eq!(forward, reverse);
        assert_eq!(forward.2, 5);
    }

    #[test]
    fn test_withdraw_before_exit_fails() {
        let (mut gadget, index) = setup_funded_validator();
        let deposit_before = gadget.validator(index).unwrap().deposit;
        assert_eq!(
            gadget.withdraw(index),
            Err(FinalityError::NotYetEligible {
                index,
                end_dynasty: SENTINEL_END_DYNASTY,
                dynasty: 4,
            })
        );
        assert_eq!(gadget.validator(index).unwrap().deposit, deposit_before);
    }

    #[test]
    fn test_logout_preconditions() {
        let (mut gadget, index) = setup_funded_validator();
        let epoch = gadget.current_epoch();
        assert_eq!(
            gadget.logout(index, epoch + 1),
            Err(FinalityError::FutureEpoch { requested: epoch + 1, current: epoch })
        );
        assert_eq!(gadget.logout(99, epoch), Err(FinalityError::UnknownValidator(99)));

        gadget.logout(index, epoch).unwrap();
        let end_dynasty = gadget.validator(index).unwrap().end_dynasty;
        assert_eq!(end_dynasty, gadget.dynasty() + 2);
        assert_eq!(
            gadget.logout(index, epoch),
            Err(FinalityError::AlreadyLoggingOut { index, end_dynasty })
        );
    }

    #[test]
    fn test_logout_then_withdraw() {
        let (mut gadget, index) = setup_funded_validator();
        let epoch = gadget.current_epoch();
        gadget.logout(index, epoch).unwrap();
        honest_vote(&mut gadget, index);

        // keep driving epochs; the validator votes while still a member,
        // and once its electorate empties the bootstrap path takes over
        for _ in 0..12 {
            advance_epoch(&mut gadget);
            let target_epoch = gadget.current_epoch();
            let target_hash = gadget.checkpoint_hash(target_epoch);
            let source_epoch = gadget.last_justified_epoch();
            let _ = gadget.vote(index, target_hash, target_epoch, source_epoch);
        }

        gadget.withdraw(index).unwrap();
        assert!(gadget.validator(index).is_none());
        let payout = gadget.host().paid_to(withdrawal_addr(1));
        assert!(payout >= min_deposit());

        assert_eq!(gadget.withdraw(index), Err(FinalityError::UnknownValidator(index)));
    }

    #[test]
    fn test_slash_double_vote() {
        let (mut gadget, index) = setup_funded_validator();
        let caller = Address::repeat_byte(0x55);
        let deposit_value = gadget.deposit_size(index);

        let message_1 = signed_vote(index, 1, 3, 7);
        let message_2 = signed_vote(index, 1, 4, 7);
        gadget.slash(caller, &message_1, &message_2).unwrap();

        let bounty = deposit_value / U256::from(25);
        assert_eq!(gadget.host().paid_to(caller), bounty);
        assert_eq!(gadget.total_destroyed(), deposit_value - bounty);
        assert!(gadget.validator(index).is_none());

        let events = gadget.drain_events();
        assert!(events.contains(&FinalityEvent::Slash {
            caller,
            offender: withdrawal_addr(1),
            index,
            bounty,
            destroyed: deposit_value - bounty,
        }));
    }

    #[test]
    fn test_slash_surround_vote() {
        let (mut gadget, index) = setup_funded_validator();
        let caller = Address::repeat_byte(0x55);

        let outer = signed_vote(index, 1, 1, 10);
        let inner = signed_vote(index, 1, 2, 5);
        gadget.slash(caller, &outer, &inner).unwrap();
        assert!(gadget.validator(index).is_none());
    }

    #[test]
    fn test_slash_rejects_non_violations() {
        let (mut gadget, index) = setup_funded_validator();
        let caller = Address::repeat_byte(0x55);

        let message = signed_vote(index, 1, 3, 7);
        assert_eq!(
            gadget.slash(caller, &message, &message),
            Err(FinalityError::SameMessage)
        );

        let earlier = signed_vote(index, 1, 1, 5);
        let later = signed_vote(index, 1, 5, 9);
        assert_eq!(
            gadget.slash(caller, &earlier, &later),
            Err(FinalityError::NoSlashableViolation)
        );

        // wrong key: signature does not match the registered address
        let forged = signed_vote(index, 9, 4, 7);
        assert_eq!(
            gadget.slash(caller, &message, &forged),
            Err(FinalityError::InvalidSignature)
        );

        // different validators named in the two messages
        let other = signed_vote(index + 1, 1, 4, 7);
        assert_eq!(
            gadget.slash(caller, &message, &other),
            Err(FinalityError::InvalidSignature)
        );

        assert!(matches!(
            gadget.slash(caller, &[0xff, 0x01], &message),
            Err(FinalityError::MalformedVoteMessage(_))
        ));

        // none of the rejections touched the validator
        assert!(gadget.validator(index).is_some());
        assert_eq!(gadget.total_destroyed(), U256::ZERO);
    }

    #[test]
    fn test_owner_sweeps_destroyed_deposits() {
        let (mut gadget, index) = setup_funded_validator();
        let caller = Address::repeat_byte(0x55);
        gadget
            .slash(caller, &signed_vote(index, 1, 3, 7), &signed_vote(index, 1, 4, 7))
            .unwrap();
        let destroyed = gadget.total_destroyed();
        assert!(destroyed > U256::ZERO);

        assert_eq!(
            gadget.owner_withdraw(caller),
            Err(FinalityError::UnauthorizedOwnerChange(caller))
        );
        assert_eq!(gadget.owner_withdraw(OWNER), Ok(destroyed));
        assert_eq!(gadget.total_destroyed(), U256::ZERO);
        assert_eq!(gadget.host().paid_to(OWNER), destroyed);
    }

    #[test]
    fn test_change_owner() {
        let mut gadget = new_gadget();
        let next = Address::repeat_byte(0xbb);
        assert_eq!(
            gadget.change_owner(next, next),
            Err(FinalityError::UnauthorizedOwnerChange(next))
        );
        gadget.change_owner(OWNER, next).unwrap();
        assert_eq!(gadget.owner_withdraw(OWNER), Err(FinalityError::UnauthorizedOwnerChange(OWNER)));
        assert_eq!(gadget.owner_withdraw(next), Ok(U256::ZERO));
    }

    #[test]
    fn test_participation_accessor() {
        let (mut gadget, index) = setup_funded_validator();
        honest_vote(&mut gadget, index);
        advance_epoch(&mut gadget);
        assert!(gadget.main_hash_voted_frac().is_zero());
        honest_vote(&mut gadget, index);
        // not exactly one: the vote reward grows the totals after tallying
        assert!(gadget.main_hash_voted_frac() > Decimal::ratio(99, 100));
        assert!(gadget.main_hash_voted_frac() <= Decimal::ONE);
    }
}
