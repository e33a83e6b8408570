//! Read-only views of the two chains.
//!
//! The finalizer never caches what these return: every phase re-reads them,
//! because proving and resolution are permissionless and any party may move
//! the on-chain state forward between two of our calls.

use crate::types::{AccountProof, BlockRef, GameStatus, ProvenWithdrawal, WithdrawalHash};
use alloy_primitives::{Address, B256, U256};
use binding::opstack::IDisputeGameFactory::GameSearchResult;
use std::future::Future;

/// The withdrawal's origin chain.
pub trait L2Chain: Send + Sync {
    /// Header fields of the block at `number`.
    fn block_ref(&self, number: u64) -> impl Future<Output = eyre::Result<BlockRef>> + Send;

    /// `eth_getProof` for a single storage slot at `block`.
    fn get_proof(
        &self,
        address: Address,
        slot: B256,
        block: u64,
    ) -> impl Future<Output = eyre::Result<AccountProof>> + Send;
}

/// OptimismPortal2 reads.
pub trait Portal: Send + Sync {
    fn portal_address(&self) -> Address;

    fn dispute_game_factory(&self) -> impl Future<Output = eyre::Result<Address>> + Send;

    /// Currently respected game type. Governance can change it at any time.
    fn respected_game_type(&self) -> impl Future<Output = eyre::Result<u32>> + Send;

    /// `None` when `submitter` has not proven `hash`.
    fn proven_withdrawal(
        &self,
        hash: WithdrawalHash,
        submitter: Address,
    ) -> impl Future<Output = eyre::Result<Option<ProvenWithdrawal>>> + Send;

    fn is_finalized(&self, hash: WithdrawalHash) -> impl Future<Output = eyre::Result<bool>> + Send;

    /// Seconds between proving and finalizing.
    fn proof_maturity_delay(&self) -> impl Future<Output = eyre::Result<u64>> + Send;

    /// Seconds between a game resolving and its result being usable.
    fn dispute_game_finality_delay(&self) -> impl Future<Output = eyre::Result<u64>> + Send;
}

/// DisputeGameFactory reads.
pub trait GameFactory: Send + Sync {
    fn game_count(&self) -> impl Future<Output = eyre::Result<U256>> + Send;

    /// Up to `n` games of `game_type`, newest first, searching back from index `start`.
    fn find_latest_games(
        &self,
        game_type: u32,
        start: U256,
        n: U256,
    ) -> impl Future<Output = eyre::Result<Vec<GameSearchResult>>> + Send;
}

/// Reads on individual dispute game instances.
pub trait DisputeGame: Send + Sync {
    fn status(&self, game: Address) -> impl Future<Output = eyre::Result<GameStatus>> + Send;

    /// Whether the challenger clock of `claim` has run out, making it resolvable.
    fn claim_clock_expired(
        &self,
        game: Address,
        claim: U256,
    ) -> impl Future<Output = eyre::Result<bool>> + Send;

    fn claim_resolved(
        &self,
        game: Address,
        claim: U256,
    ) -> impl Future<Output = eyre::Result<bool>> + Send;

    /// Zero while the game is in progress.
    fn resolved_at(&self, game: Address) -> impl Future<Output = eyre::Result<u64>> + Send;
}

/// Settlement-layer time, as seen by contracts.
pub trait L1Clock: Send + Sync {
    fn latest_timestamp(&self) -> impl Future<Output = eyre::Result<u64>> + Send;
}

/// Everything the finalizer reads from the settlement layer.
pub trait L1Chain: Portal + GameFactory + DisputeGame + L1Clock {}

impl<T> L1Chain for T where T: Portal + GameFactory + DisputeGame + L1Clock {}
