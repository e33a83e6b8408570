//! Finalize withdrawal action.
//!
//! Finalizes a proven withdrawal on L1, executing the withdrawal transaction
//! and sending ETH to the recipient.

use crate::{Action, ActionError, IncludedTx, TxCandidate, TxSubmitter};
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use binding::opstack::{IOptimismPortal2, WithdrawalTransaction};
use tracing::{debug, info};
use withdrawal::{GameStatus, L1Chain, WithdrawalHash};

/// Where a proven withdrawal stands relative to the portal's finalization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Finalized,
    NotProven,
    /// The proving game has not resolved yet.
    GameUnresolved(GameStatus),
    /// The proving game resolved against its root claim.
    GameLost(GameStatus),
    /// Seconds left until both the proof maturity and game finality delays elapse.
    Waiting(u64),
    Ready,
}

/// Encode the finalize call, using the plain variant when we proved the
/// withdrawal ourselves.
pub fn finalize_calldata(
    withdrawal: WithdrawalTransaction,
    sender: Address,
    proof_submitter: Address,
) -> Vec<u8> {
    if sender == proof_submitter {
        IOptimismPortal2::finalizeWithdrawalTransactionCall { _tx: withdrawal }.abi_encode()
    } else {
        IOptimismPortal2::finalizeWithdrawalTransactionExternalProofCall {
            _tx: withdrawal,
            _proofSubmitter: proof_submitter,
        }
        .abi_encode()
    }
}

/// Action to finalize a proven withdrawal on L1.
pub struct FinalizeAction<'a, L1, S> {
    l1: &'a L1,
    submitter: &'a S,
    withdrawal: WithdrawalTransaction,
    withdrawal_hash: WithdrawalHash,
    proof_submitter: Address,
}

impl<'a, L1, S> FinalizeAction<'a, L1, S>
where
    L1: L1Chain,
    S: TxSubmitter,
{
    pub const fn new(
        l1: &'a L1,
        submitter: &'a S,
        withdrawal: WithdrawalTransaction,
        withdrawal_hash: WithdrawalHash,
        proof_submitter: Address,
    ) -> Self {
        Self {
            l1,
            submitter,
            withdrawal,
            withdrawal_hash,
            proof_submitter,
        }
    }

    /// Get the withdrawal hash for this action.
    pub const fn withdrawal_hash(&self) -> WithdrawalHash {
        self.withdrawal_hash
    }

    /// Mirror the portal's finalization checks against current L1 state.
    pub async fn readiness(&self) -> eyre::Result<Readiness> {
        if self.l1.is_finalized(self.withdrawal_hash).await? {
            return Ok(Readiness::Finalized);
        }

        let Some(proven) = self
            .l1
            .proven_withdrawal(self.withdrawal_hash, self.proof_submitter)
            .await?
        else {
            return Ok(Readiness::NotProven);
        };

        let game = proven.dispute_game_proxy;
        match self.l1.status(game).await? {
            GameStatus::DefenderWins => {}
            GameStatus::ChallengerWins => {
                return Ok(Readiness::GameLost(GameStatus::ChallengerWins))
            }
            status @ GameStatus::InProgress => return Ok(Readiness::GameUnresolved(status)),
        }

        let maturity_delay = self.l1.proof_maturity_delay().await?;
        let finality_delay = self.l1.dispute_game_finality_delay().await?;
        let resolved_at = self.l1.resolved_at(game).await?;
        let now = self.l1.latest_timestamp().await?;

        let ready_at = proven
            .timestamp
            .saturating_add(maturity_delay)
            .max(resolved_at.saturating_add(finality_delay));

        debug!(
            withdrawal_hash = %self.withdrawal_hash,
            proven_at = proven.timestamp,
            resolved_at,
            ready_at,
            now,
            "Checked finalization delays"
        );

        if now >= ready_at {
            Ok(Readiness::Ready)
        } else {
            Ok(Readiness::Waiting(ready_at - now))
        }
    }
}

impl<L1, S> Action for FinalizeAction<'_, L1, S>
where
    L1: L1Chain,
    S: TxSubmitter,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        Ok(self.readiness().await? == Readiness::Ready)
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        self.l1.is_finalized(self.withdrawal_hash).await
    }

    async fn execute(&self) -> Result<IncludedTx, ActionError> {
        match self.readiness().await? {
            Readiness::Ready => {}
            Readiness::Finalized => return Err(ActionError::AlreadyCompleted(self.description())),
            other => return Err(ActionError::NotReady(format!("{other:?}"))),
        }

        info!(
            withdrawal_hash = %self.withdrawal_hash,
            proof_submitter = %self.proof_submitter,
            "Finalizing withdrawal"
        );

        let data = finalize_calldata(
            self.withdrawal.clone(),
            self.submitter.sender(),
            self.proof_submitter,
        );
        let included = self
            .submitter
            .include(TxCandidate::call(self.l1.portal_address(), data))
            .await?;

        info!(
            tx_hash = %included.tx_hash,
            block_number = included.block_number,
            gas_used = included.gas_used,
            withdrawal_hash = %self.withdrawal_hash,
            "Withdrawal finalized on L1"
        );
        Ok(included)
    }

    fn description(&self) -> String {
        format!("Finalizing withdrawal {} on L1", self.withdrawal_hash)
    }
}
