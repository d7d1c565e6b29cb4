//! Slashing evidence: standalone signed vote messages and equivocation
//! detection
//!
//! `vote` itself is a direct typed call, but slashing evidence may be
//! relayed by anyone, so it travels as a self-contained RLP message whose
//! signature the gadget verifies against the offender's registered key.

use alloy_primitives::{B256, Bytes, keccak256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};

/// A standalone signed vote message, the evidence format accepted by
/// `slash`.
///
/// Wire form is the RLP list
/// `(validator_index, target_hash, target_epoch, source_epoch, signature)`.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct SignedVote {
    /// Index of the voting validator
    pub validator_index: u64,
    /// Checkpoint hash voted for
    pub target_hash: B256,
    /// Epoch of the checkpoint voted for
    pub target_epoch: u64,
    /// Justified epoch the vote links back to
    pub source_epoch: u64,
    /// Signature over [`SignedVote::sighash`]
    pub signature: Bytes,
}

#[derive(RlpEncodable)]
struct VotePayload {
    validator_index: u64,
    target_hash: B256,
    target_epoch: u64,
    source_epoch: u64,
}

impl SignedVote {
    /// Decode a message from its RLP wire form.
    pub fn from_rlp(bytes: &[u8]) -> Result<Self, alloy_rlp::Error> {
        let mut slice = bytes;
        Self::decode(&mut slice)
    }

    /// RLP wire form.
    pub fn to_rlp(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Hash of the unsigned fields; what the validator's key must have
    /// signed.
    pub fn sighash(&self) -> B256 {
        let payload = VotePayload {
            validator_index: self.validator_index,
            target_hash: self.target_hash,
            target_epoch: self.target_epoch,
            source_epoch: self.source_epoch,
        };
        let mut out = Vec::new();
        payload.encode(&mut out);
        keccak256(out)
    }
}

/// A provable equivocation between two votes from one validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashingViolation {
    /// Two distinct votes for the same target epoch
    DoubleVote,
    /// One vote's source-target span strictly contains the other's
    SurroundVote,
}

/// Detect the slashing condition between two votes, if any.
pub fn detect_violation(a: &SignedVote, b: &SignedVote) -> Option<SlashingViolation> {
    if a.target_epoch == b.target_epoch {
        return Some(SlashingViolation::DoubleVote);
    }
    let surrounds = (a.target_epoch > b.target_epoch && a.source_epoch < b.source_epoch)
        || (b.target_epoch > a.target_epoch && b.source_epoch < a.source_epoch);
    surrounds.then_some(SlashingViolation::SurroundVote)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(source_epoch: u64, target_epoch: u64) -> SignedVote {
        SignedVote {
            validator_index: 1,
            target_hash: B256::repeat_byte(0xcc),
            target_epoch,
            source_epoch,
            signature: Bytes::from_static(&[0u8; 65]),
        }
    }

    #[test]
    fn test_wire_roundtrip() {
        let original = vote(4, 5);
        let decoded = SignedVote::from_rlp(&original.to_rlp()).unwrap();
        assert_eq!(decoded, original);
        assert!(SignedVote::from_rlp(&[0xff, 0x01]).is_err());
    }

    #[test]
    fn test_sighash_ignores_signature() {
        let mut a = vote(4, 5);
        let mut b = a.clone();
        b.signature = Bytes::from_static(&[7u8; 65]);
        assert_eq!(a.sighash(), b.sighash());

        a.source_epoch = 3;
        assert_ne!(a.sighash(), b.sighash());
    }

    #[test]
    fn test_double_vote_detected() {
        let a = vote(3, 5);
        let b = vote(4, 5);
        assert_eq!(detect_violation(&a, &b), Some(SlashingViolation::DoubleVote));
    }

    #[test]
    fn test_surround_vote_detected() {
        let outer = vote(1, 10);
        let inner = vote(2, 5);
        assert_eq!(detect_violation(&outer, &inner), Some(SlashingViolation::SurroundVote));
        assert_eq!(detect_violation(&inner, &outer), Some(SlashingViolation::SurroundVote));
    }

    #[test]
    fn test_disjoint_votes_are_clean() {
        let earlier = vote(1, 5);
        let later = vote(5, 9);
        assert_eq!(detect_violation(&earlier, &later), None);
        // shared source, different targets: also clean
        assert_eq!(detect_violation(&vote(2, 5), &vote(2, 7)), None);
    }
}
