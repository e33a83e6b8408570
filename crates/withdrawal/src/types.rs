use alloy_primitives::{Address, Bytes, B256, U256};
use binding::opstack::{OutputRootProof, WithdrawalTransaction};

pub type WithdrawalHash = B256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalStatus {
    Initiated,
    Proven { timestamp: u64, dispute_game_proxy: Address },
    Finalized,
}

/// On-chain record written by a successful proof submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvenWithdrawal {
    pub dispute_game_proxy: Address,
    pub timestamp: u64,
}

/// A withdrawal as emitted by the `MessagePassed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalEvent {
    pub transaction: WithdrawalTransaction,
    /// Hash carried by the event itself
    pub hash: WithdrawalHash,
    /// L2 block containing the withdrawal
    pub l2_block: u64,
}

/// The parts of an L2 block header the proof needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub number: u64,
    pub hash: B256,
    pub state_root: B256,
    pub timestamp: u64,
}

/// `eth_getProof` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProof {
    pub address: Address,
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: B256,
    pub storage_hash: B256,
    pub account_proof: Vec<Bytes>,
    pub storage_proof: Vec<StorageProof>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageProof {
    pub key: B256,
    pub value: U256,
    pub proof: Vec<Bytes>,
}

/// Dispute game status as reported by `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameStatus {
    InProgress = 0,
    ChallengerWins = 1,
    DefenderWins = 2,
}

impl GameStatus {
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl TryFrom<u8> for GameStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::InProgress),
            1 => Ok(Self::ChallengerWins),
            2 => Ok(Self::DefenderWins),
            other => Err(other),
        }
    }
}

/// A dispute game as returned by the factory, with its claimed L2 block decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeGameRecord {
    pub index: U256,
    pub game_type: u32,
    pub proxy: Address,
    pub created_at: u64,
    pub root_claim: B256,
    pub extra_data: Bytes,
    /// L2 block height the game's root claim commits to
    pub l2_block: u64,
}

/// Everything `proveWithdrawalTransaction` takes.
#[derive(Debug, Clone)]
pub struct ProvenWithdrawalParameters {
    pub withdrawal: WithdrawalTransaction,
    pub dispute_game_index: U256,
    pub output_root_proof: OutputRootProof,
    pub withdrawal_proof: Vec<Bytes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_status_from_u8() {
        assert_eq!(GameStatus::try_from(0), Ok(GameStatus::InProgress));
        assert_eq!(GameStatus::try_from(1), Ok(GameStatus::ChallengerWins));
        assert_eq!(GameStatus::try_from(2), Ok(GameStatus::DefenderWins));
        assert_eq!(GameStatus::try_from(3), Err(3));
    }

    #[test]
    fn test_game_status_resolved() {
        assert!(!GameStatus::InProgress.is_resolved());
        assert!(GameStatus::ChallengerWins.is_resolved());
        assert!(GameStatus::DefenderWins.is_resolved());
    }
}
