//! Prove withdrawal action.
//!
//! Submits a proof to L1 that a withdrawal was initiated on L2.

use crate::{Action, ActionError, IncludedTx, TxCandidate, TxSubmitter};
use alloy_sol_types::SolCall;
use binding::opstack::IOptimismPortal2;
use tracing::info;
use withdrawal::{
    GameLocator, L1Chain, L2Chain, ProvenWithdrawalParameters, WithdrawalEvent, WithdrawalHash,
    WithdrawalParamBuilder,
};

/// Encode `proveWithdrawalTransaction` for the portal.
pub fn prove_calldata(params: ProvenWithdrawalParameters) -> Vec<u8> {
    IOptimismPortal2::proveWithdrawalTransactionCall {
        _tx: params.withdrawal,
        _disputeGameIndex: params.dispute_game_index,
        _outputRootProof: params.output_root_proof,
        _withdrawalProof: params.withdrawal_proof,
    }
    .abi_encode()
}

/// Action to prove a withdrawal on L1 against the latest covering game.
///
/// The game and the proof are looked up again on every execution, so a
/// retry after a revert never reuses stale parameters.
pub struct ProveAction<'a, L1, L2, S> {
    l1: &'a L1,
    l2: &'a L2,
    submitter: &'a S,
    event: WithdrawalEvent,
}

impl<'a, L1, L2, S> ProveAction<'a, L1, L2, S>
where
    L1: L1Chain,
    L2: L2Chain,
    S: TxSubmitter,
{
    pub const fn new(l1: &'a L1, l2: &'a L2, submitter: &'a S, event: WithdrawalEvent) -> Self {
        Self {
            l1,
            l2,
            submitter,
            event,
        }
    }

    /// Get the withdrawal hash for this action.
    pub const fn withdrawal_hash(&self) -> WithdrawalHash {
        self.event.hash
    }
}

impl<L1, L2, S> Action for ProveAction<'_, L1, L2, S>
where
    L1: L1Chain,
    L2: L2Chain,
    S: TxSubmitter,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        if self.is_completed().await? {
            return Ok(false);
        }
        let covering = GameLocator::new(self.l1)
            .game_covering(self.event.l2_block)
            .await?;
        Ok(covering.is_some())
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        let proven = self
            .l1
            .proven_withdrawal(self.event.hash, self.submitter.sender())
            .await?;
        Ok(proven.is_some())
    }

    async fn execute(&self) -> Result<IncludedTx, ActionError> {
        if self.is_completed().await? {
            return Err(ActionError::AlreadyCompleted(self.description()));
        }

        let Some(game) = GameLocator::new(self.l1)
            .game_covering(self.event.l2_block)
            .await?
        else {
            return Err(ActionError::NotReady(format!(
                "no game covers L2 block {}",
                self.event.l2_block
            )));
        };

        info!(
            withdrawal_hash = %self.event.hash,
            l2_block = self.event.l2_block,
            game_index = %game.index,
            game_l2_block = game.l2_block,
            "Generating withdrawal proof"
        );
        let params = WithdrawalParamBuilder::new(self.l2)
            .build_for_game(&self.event, &game)
            .await?;

        let candidate = TxCandidate::call(self.l1.portal_address(), prove_calldata(params));
        let included = self.submitter.include(candidate).await?;

        info!(
            tx_hash = %included.tx_hash,
            block_number = included.block_number,
            gas_used = included.gas_used,
            withdrawal_hash = %self.event.hash,
            dispute_game_index = %game.index,
            "Withdrawal proven on L1"
        );
        Ok(included)
    }

    fn description(&self) -> String {
        format!("Proving withdrawal {} on L1", self.event.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use binding::opstack::OutputRootProof;
    use withdrawal::test_utils::{message_passer_fixture, sample_event};

    #[test]
    fn test_prove_calldata_targets_portal_call() {
        let event = sample_event(1, 10);
        let fixture = message_passer_fixture(event.hash, 10);
        let params = ProvenWithdrawalParameters {
            withdrawal: event.transaction.clone(),
            dispute_game_index: U256::from(5),
            output_root_proof: OutputRootProof {
                version: Default::default(),
                stateRoot: fixture.block.state_root,
                messagePasserStorageRoot: fixture.proof.storage_hash,
                latestBlockhash: fixture.block.hash,
            },
            withdrawal_proof: fixture.proof.storage_proof[0].proof.clone(),
        };

        let data = prove_calldata(params);
        assert_eq!(
            &data[..4],
            IOptimismPortal2::proveWithdrawalTransactionCall::SELECTOR.as_slice()
        );

        let decoded = IOptimismPortal2::proveWithdrawalTransactionCall::abi_decode(&data).unwrap();
        assert_eq!(decoded._tx, event.transaction);
        assert_eq!(decoded._disputeGameIndex, U256::from(5));
        assert_eq!(decoded._outputRootProof.stateRoot, fixture.block.state_root);
        assert_eq!(decoded._withdrawalProof, fixture.proof.storage_proof[0].proof);
    }
}
