//! Assembling `proveWithdrawalTransaction` arguments from L2 state.

use crate::{
    chain::L2Chain,
    error::WithdrawalError,
    hash::{compute_output_root, compute_storage_slot, verify_withdrawal_hash},
    types::{BlockRef, DisputeGameRecord, ProvenWithdrawalParameters, WithdrawalEvent},
    verify::{verify_account_proof, verify_storage_proof},
};
use alloy_primitives::B256;
use alloy_trie::TrieAccount;
use binding::opstack::{OutputRootProof, MESSAGE_PASSER_ADDRESS, OUTPUT_VERSION_V0};
use tracing::debug;

/// Builds verified proving parameters for a withdrawal against one dispute game.
///
/// Nothing is cached: every call fetches the proof fresh, so a retry after a
/// revert always proves against current chain data.
pub struct WithdrawalParamBuilder<'a, L2> {
    l2: &'a L2,
}

impl<'a, L2: L2Chain> WithdrawalParamBuilder<'a, L2> {
    pub const fn new(l2: &'a L2) -> Self {
        Self { l2 }
    }

    /// Fetch the game's claimed L2 block and build parameters against it.
    pub async fn build_for_game(
        &self,
        event: &WithdrawalEvent,
        game: &DisputeGameRecord,
    ) -> Result<ProvenWithdrawalParameters, WithdrawalError> {
        let block = self.l2.block_ref(game.l2_block).await?;
        self.build(event, &block, game).await
    }

    /// Prove `event` is in the message passer's storage at `block`, the L2
    /// block claimed by `game`.
    pub async fn build(
        &self,
        event: &WithdrawalEvent,
        block: &BlockRef,
        game: &DisputeGameRecord,
    ) -> Result<ProvenWithdrawalParameters, WithdrawalError> {
        let withdrawal_hash = verify_withdrawal_hash(&event.transaction, event.hash)?;
        let slot = compute_storage_slot(withdrawal_hash);

        debug!(
            %withdrawal_hash,
            %slot,
            block = block.number,
            game_index = %game.index,
            "Fetching message passer proof"
        );
        let response = self
            .l2
            .get_proof(MESSAGE_PASSER_ADDRESS, slot, block.number)
            .await?;

        let [storage] = response.storage_proof.as_slice() else {
            return Err(WithdrawalError::MalformedProof {
                reason: format!(
                    "expected exactly one storage proof, got {}",
                    response.storage_proof.len()
                ),
            });
        };
        if storage.key != slot {
            return Err(WithdrawalError::MalformedProof {
                reason: format!("storage proof key {} does not match slot {}", storage.key, slot),
            });
        }
        if storage.value.is_zero() {
            return Err(WithdrawalError::ProofInvalid {
                field: "storageProof.value",
                reason: "withdrawal is not present in sentMessages".into(),
            });
        }

        verify_storage_proof(response.storage_hash, slot, storage.value, &storage.proof)?;
        let account = TrieAccount {
            nonce: response.nonce,
            balance: response.balance,
            storage_root: response.storage_hash,
            code_hash: response.code_hash,
        };
        verify_account_proof(
            block.state_root,
            MESSAGE_PASSER_ADDRESS,
            &account,
            &response.account_proof,
        )?;

        let output_root_proof = OutputRootProof {
            version: OUTPUT_VERSION_V0,
            stateRoot: block.state_root,
            messagePasserStorageRoot: response.storage_hash,
            latestBlockhash: block.hash,
        };

        if game.root_claim != B256::ZERO {
            let computed = compute_output_root(&output_root_proof);
            if computed != game.root_claim {
                return Err(WithdrawalError::OutputRootMismatch {
                    computed,
                    claimed: game.root_claim,
                });
            }
        }

        debug!(
            %withdrawal_hash,
            proof_nodes = storage.proof.len(),
            "Built proving parameters"
        );

        Ok(ProvenWithdrawalParameters {
            withdrawal: event.transaction.clone(),
            dispute_game_index: game.index,
            output_root_proof,
            withdrawal_proof: storage.proof.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{message_passer_fixture, sample_event, MessagePasserFixture},
        types::AccountProof,
    };
    use alloy_primitives::{Address, Bytes, U256};
    use eyre::eyre;

    struct MockL2 {
        fixture: MessagePasserFixture,
        slot: B256,
    }

    impl L2Chain for MockL2 {
        async fn block_ref(&self, number: u64) -> eyre::Result<BlockRef> {
            if number != self.fixture.block.number {
                return Err(eyre!("unknown block {number}"));
            }
            Ok(self.fixture.block)
        }

        async fn get_proof(
            &self,
            address: Address,
            slot: B256,
            block: u64,
        ) -> eyre::Result<AccountProof> {
            assert_eq!(address, MESSAGE_PASSER_ADDRESS);
            assert_eq!(block, self.fixture.block.number);
            assert_eq!(slot, self.slot);
            Ok(self.fixture.proof.clone())
        }
    }

    fn setup() -> (WithdrawalEvent, MockL2, DisputeGameRecord) {
        let event = sample_event(7, 90);
        let fixture = message_passer_fixture(event.hash, 100);
        let game = DisputeGameRecord {
            index: U256::from(3),
            game_type: 1,
            proxy: Address::repeat_byte(0x9a),
            created_at: 1_700_000_000,
            root_claim: fixture.output_root,
            extra_data: Bytes::from(U256::from(100).to_be_bytes::<32>().to_vec()),
            l2_block: 100,
        };
        let slot = compute_storage_slot(event.hash);
        (event, MockL2 { fixture, slot }, game)
    }

    #[tokio::test]
    async fn test_build_for_game() {
        let (event, l2, game) = setup();
        let params = WithdrawalParamBuilder::new(&l2)
            .build_for_game(&event, &game)
            .await
            .unwrap();

        assert_eq!(params.withdrawal, event.transaction);
        assert_eq!(params.dispute_game_index, U256::from(3));
        assert_eq!(params.output_root_proof.version, OUTPUT_VERSION_V0);
        assert_eq!(params.output_root_proof.stateRoot, l2.fixture.block.state_root);
        assert_eq!(params.output_root_proof.latestBlockhash, l2.fixture.block.hash);
        assert_eq!(
            params.output_root_proof.messagePasserStorageRoot,
            l2.fixture.proof.storage_hash
        );
        assert_eq!(compute_output_root(&params.output_root_proof), game.root_claim);
        assert_eq!(params.withdrawal_proof, l2.fixture.proof.storage_proof[0].proof);
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_rejected_before_fetching() {
        let (mut event, l2, game) = setup();
        event.transaction.value += U256::from(1);

        let err = WithdrawalParamBuilder::new(&l2)
            .build_for_game(&event, &game)
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::HashMismatch { emitted, .. } if emitted == event.hash));
    }

    #[tokio::test]
    async fn test_missing_storage_proof() {
        let (event, mut l2, game) = setup();
        l2.fixture.proof.storage_proof.clear();

        let err = WithdrawalParamBuilder::new(&l2)
            .build(&event, &l2.fixture.block, &game)
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::MalformedProof { .. }));
    }

    #[tokio::test]
    async fn test_extra_storage_proof() {
        let (event, mut l2, game) = setup();
        let extra = l2.fixture.proof.storage_proof[0].clone();
        l2.fixture.proof.storage_proof.push(extra);

        let err = WithdrawalParamBuilder::new(&l2)
            .build(&event, &l2.fixture.block, &game)
            .await
            .unwrap_err();
        match err {
            WithdrawalError::MalformedProof { reason } => assert!(reason.contains("got 2")),
            other => panic!("expected MalformedProof, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_storage_key() {
        let (event, mut l2, game) = setup();
        l2.fixture.proof.storage_proof[0].key = B256::repeat_byte(1);

        let err = WithdrawalParamBuilder::new(&l2)
            .build(&event, &l2.fixture.block, &game)
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::MalformedProof { .. }));
    }

    #[tokio::test]
    async fn test_zero_value_is_not_sent() {
        let (event, mut l2, game) = setup();
        l2.fixture.proof.storage_proof[0].value = U256::ZERO;

        let err = WithdrawalParamBuilder::new(&l2)
            .build(&event, &l2.fixture.block, &game)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WithdrawalError::ProofInvalid {
                field: "storageProof.value",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_tampered_account_proof() {
        let (event, mut l2, game) = setup();
        let mut node = l2.fixture.proof.account_proof[0].to_vec();
        node[3] ^= 0x01;
        l2.fixture.proof.account_proof[0] = node.into();

        let err = WithdrawalParamBuilder::new(&l2)
            .build(&event, &l2.fixture.block, &game)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WithdrawalError::ProofInvalid {
                field: "accountProof",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_output_root_must_match_claim() {
        let (event, l2, mut game) = setup();
        game.root_claim = B256::repeat_byte(0x42);

        let err = WithdrawalParamBuilder::new(&l2)
            .build(&event, &l2.fixture.block, &game)
            .await
            .unwrap_err();
        match err {
            WithdrawalError::OutputRootMismatch { computed, claimed } => {
                assert_eq!(computed, l2.fixture.output_root);
                assert_eq!(claimed, B256::repeat_byte(0x42));
            }
            other => panic!("expected OutputRootMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_claim_skips_output_root_check() {
        let (event, l2, mut game) = setup();
        game.root_claim = B256::ZERO;

        assert!(WithdrawalParamBuilder::new(&l2)
            .build(&event, &l2.fixture.block, &game)
            .await
            .is_ok());
    }
}
