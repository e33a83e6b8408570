//! Dispute game resolution actions.
//!
//! Both calls are permissionless: anyone may resolve the root claim or the
//! game once its clock has run out, so completion is always read back from
//! the game rather than inferred from our own transactions.

use crate::{Action, ActionError, IncludedTx, TxCandidate, TxSubmitter};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use binding::opstack::IFaultDisputeGame;
use tracing::info;
use withdrawal::DisputeGame;

/// Index of the root claim in every fault dispute game.
pub const ROOT_CLAIM: U256 = U256::ZERO;

/// Resolve the root claim's subgame once its challenger clock has expired.
pub struct ResolveClaimAction<'a, L1, S> {
    l1: &'a L1,
    submitter: &'a S,
    game: Address,
}

impl<'a, L1, S> ResolveClaimAction<'a, L1, S>
where
    L1: DisputeGame,
    S: TxSubmitter,
{
    pub const fn new(l1: &'a L1, submitter: &'a S, game: Address) -> Self {
        Self {
            l1,
            submitter,
            game,
        }
    }
}

impl<L1, S> Action for ResolveClaimAction<'_, L1, S>
where
    L1: DisputeGame,
    S: TxSubmitter,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        self.l1.claim_clock_expired(self.game, ROOT_CLAIM).await
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        if self.l1.claim_resolved(self.game, ROOT_CLAIM).await? {
            return Ok(true);
        }
        Ok(self.l1.status(self.game).await?.is_resolved())
    }

    async fn execute(&self) -> Result<IncludedTx, ActionError> {
        if self.is_completed().await? {
            return Err(ActionError::AlreadyCompleted(self.description()));
        }

        // a zero batch size resolves every remaining child in one call
        let data = IFaultDisputeGame::resolveClaimCall {
            _claimIndex: ROOT_CLAIM,
            _numToResolve: U256::ZERO,
        }
        .abi_encode();
        let included = self
            .submitter
            .include(TxCandidate::call(self.game, data))
            .await?;

        info!(
            tx_hash = %included.tx_hash,
            game = %self.game,
            gas_used = included.gas_used,
            "Root claim resolved"
        );
        Ok(included)
    }

    fn description(&self) -> String {
        format!("Resolving root claim of game {}", self.game)
    }
}

/// Resolve the game itself once its root claim is resolved.
pub struct ResolveGameAction<'a, L1, S> {
    l1: &'a L1,
    submitter: &'a S,
    game: Address,
}

impl<'a, L1, S> ResolveGameAction<'a, L1, S>
where
    L1: DisputeGame,
    S: TxSubmitter,
{
    pub const fn new(l1: &'a L1, submitter: &'a S, game: Address) -> Self {
        Self {
            l1,
            submitter,
            game,
        }
    }
}

impl<L1, S> Action for ResolveGameAction<'_, L1, S>
where
    L1: DisputeGame,
    S: TxSubmitter,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        self.l1.claim_resolved(self.game, ROOT_CLAIM).await
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        Ok(self.l1.status(self.game).await?.is_resolved())
    }

    async fn execute(&self) -> Result<IncludedTx, ActionError> {
        if self.is_completed().await? {
            return Err(ActionError::AlreadyCompleted(self.description()));
        }

        let data = IFaultDisputeGame::resolveCall {}.abi_encode();
        let included = self
            .submitter
            .include(TxCandidate::call(self.game, data))
            .await?;

        info!(
            tx_hash = %included.tx_hash,
            game = %self.game,
            gas_used = included.gas_used,
            "Game resolved"
        );
        Ok(included)
    }

    fn description(&self) -> String {
        format!("Resolving game {}", self.game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSubmitter;
    use withdrawal::GameStatus;

    struct MockGame {
        status: GameStatus,
        clock_expired: bool,
        claim_resolved: bool,
    }

    impl DisputeGame for MockGame {
        async fn status(&self, _game: Address) -> eyre::Result<GameStatus> {
            Ok(self.status)
        }

        async fn claim_clock_expired(&self, _game: Address, claim: U256) -> eyre::Result<bool> {
            assert_eq!(claim, ROOT_CLAIM);
            Ok(self.clock_expired)
        }

        async fn claim_resolved(&self, _game: Address, _claim: U256) -> eyre::Result<bool> {
            Ok(self.claim_resolved)
        }

        async fn resolved_at(&self, _game: Address) -> eyre::Result<u64> {
            Ok(0)
        }
    }

    const GAME: Address = Address::repeat_byte(0x9a);

    #[tokio::test]
    async fn test_resolve_claim_sends_root_claim_call() {
        let l1 = MockGame {
            status: GameStatus::InProgress,
            clock_expired: true,
            claim_resolved: false,
        };
        let submitter = RecordingSubmitter::new(Address::repeat_byte(1));
        let action = ResolveClaimAction::new(&l1, &submitter, GAME);

        assert!(action.is_ready().await.unwrap());
        action.execute().await.unwrap();

        let sent = submitter.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, GAME);
        let call = IFaultDisputeGame::resolveClaimCall::abi_decode(&sent[0].data).unwrap();
        assert_eq!(call._claimIndex, U256::ZERO);
        assert_eq!(call._numToResolve, U256::ZERO);
    }

    #[tokio::test]
    async fn test_resolve_claim_skips_when_already_resolved() {
        let l1 = MockGame {
            status: GameStatus::InProgress,
            clock_expired: true,
            claim_resolved: true,
        };
        let submitter = RecordingSubmitter::default();
        let action = ResolveClaimAction::new(&l1, &submitter, GAME);

        assert!(matches!(
            action.execute().await,
            Err(ActionError::AlreadyCompleted(_))
        ));
        assert!(submitter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_game_waits_for_claim() {
        let l1 = MockGame {
            status: GameStatus::InProgress,
            clock_expired: true,
            claim_resolved: false,
        };
        let submitter = RecordingSubmitter::default();
        let action = ResolveGameAction::new(&l1, &submitter, GAME);
        assert!(!action.is_ready().await.unwrap());
        assert!(!action.is_completed().await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_game_completed_by_anyone() {
        let l1 = MockGame {
            status: GameStatus::DefenderWins,
            clock_expired: true,
            claim_resolved: true,
        };
        let submitter = RecordingSubmitter::default();
        let action = ResolveGameAction::new(&l1, &submitter, GAME);

        assert!(action.is_completed().await.unwrap());
        assert!(matches!(
            action.execute().await,
            Err(ActionError::AlreadyCompleted(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_game_sends_resolve() {
        let l1 = MockGame {
            status: GameStatus::InProgress,
            clock_expired: true,
            claim_resolved: true,
        };
        let submitter = RecordingSubmitter::default();
        ResolveGameAction::new(&l1, &submitter, GAME)
            .execute()
            .await
            .unwrap();

        let sent = submitter.sent();
        assert_eq!(
            &sent[0].data[..],
            IFaultDisputeGame::resolveCall::SELECTOR.as_slice()
        );
    }
}
