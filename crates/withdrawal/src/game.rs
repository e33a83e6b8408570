//! Locating the dispute game that covers a withdrawal.
//!
//! The factory orders games by creation, so the newest game of the respected
//! type is the one with the highest claimed L2 block. Waiting for a covering
//! game polls the factory.

use crate::{
    chain::{GameFactory, Portal},
    error::WithdrawalError,
    types::DisputeGameRecord,
};
use alloy_primitives::{Address, U256};
use binding::opstack::IDisputeGameFactory::GameSearchResult;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Finds the authoritative dispute game for a withdrawal.
pub struct GameLocator<'a, L1> {
    l1: &'a L1,
}

impl<'a, L1> GameLocator<'a, L1>
where
    L1: Portal + GameFactory,
{
    pub const fn new(l1: &'a L1) -> Self {
        Self { l1 }
    }

    /// The most recent game of `respected_game_type`.
    pub async fn find_latest_game(
        &self,
        respected_game_type: u32,
    ) -> Result<DisputeGameRecord, WithdrawalError> {
        let game_count = self.l1.game_count().await?;
        if game_count.is_zero() {
            return Err(WithdrawalError::NoGames);
        }

        let latest = game_count - U256::from(1);
        let games = self
            .l1
            .find_latest_games(respected_game_type, latest, U256::from(1))
            .await?;
        let game = games.into_iter().next().ok_or(WithdrawalError::NoGameFound {
            game_type: respected_game_type,
        })?;

        if game.index > latest {
            return Err(WithdrawalError::MalformedGame {
                index: game.index,
                reason: format!("index beyond game count {}", game_count),
            });
        }

        decode_game(respected_game_type, game)
    }

    /// The latest game if it already covers `target`, reading the respected
    /// game type fresh from the portal.
    pub async fn game_covering(
        &self,
        target: u64,
    ) -> Result<Option<DisputeGameRecord>, WithdrawalError> {
        let game = self.latest_respected_game().await?;
        Ok((game.l2_block >= target).then_some(game))
    }

    async fn latest_respected_game(&self) -> Result<DisputeGameRecord, WithdrawalError> {
        let game_type = self.l1.respected_game_type().await?;
        self.find_latest_game(game_type).await
    }

    /// Poll until a game claiming an L2 block at or above `target` is published.
    ///
    /// Missing games are expected while waiting and transient RPC failures are
    /// logged; only a malformed game ends the wait early.
    pub async fn for_game_published(
        &self,
        target: u64,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<DisputeGameRecord, WithdrawalError> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut last_seen = None;

        loop {
            match self.latest_respected_game().await {
                Ok(game) if game.l2_block >= target => {
                    info!(
                        game_index = %game.index,
                        game_l2_block = game.l2_block,
                        target,
                        "Found game covering withdrawal block"
                    );
                    return Ok(game);
                }
                Err(e) if e.is_deterministic() => return Err(e),
                Ok(game) => {
                    last_seen = Some(game.l2_block);
                    debug!(target, latest = game.l2_block, "Latest game does not cover target yet");
                }
                Err(WithdrawalError::NoGames | WithdrawalError::NoGameFound { .. }) => {
                    debug!(target, "No games of the respected type yet");
                }
                Err(e) => warn!(target, error = %e, "Game lookup failed, will retry"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WithdrawalError::Timeout {
                    target,
                    last_seen,
                    waited: now - start,
                });
            }
            sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

/// Decode the claimed L2 block and proxy address from a factory search result.
pub fn decode_game(
    game_type: u32,
    game: GameSearchResult,
) -> Result<DisputeGameRecord, WithdrawalError> {
    let l2_block = claimed_l2_block(&game.extraData).map_err(|reason| {
        WithdrawalError::MalformedGame {
            index: game.index,
            reason,
        }
    })?;

    Ok(DisputeGameRecord {
        index: game.index,
        game_type,
        proxy: game_proxy(game.metadata.as_slice()),
        created_at: game.timestamp,
        root_claim: game.rootClaim,
        extra_data: game.extraData,
        l2_block,
    })
}

/// The claimed L2 block is the big-endian word at the start of extra data.
fn claimed_l2_block(extra_data: &[u8]) -> Result<u64, String> {
    let word = extra_data
        .get(..32)
        .ok_or_else(|| format!("extra data is {} bytes, expected at least 32", extra_data.len()))?;
    let block = U256::from_be_slice(word);
    u64::try_from(block).map_err(|_| format!("claimed L2 block {} exceeds u64", block))
}

/// GameId packing: type (32 bits) | timestamp (64 bits) | proxy address (160 bits)
fn game_proxy(metadata: &[u8]) -> Address {
    Address::from_slice(&metadata[12..32])
}
