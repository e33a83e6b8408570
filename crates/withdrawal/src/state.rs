//! Discovering withdrawals and their current on-chain status.

use crate::{
    chain::Portal,
    hash::compute_withdrawal_hash,
    types::{WithdrawalEvent, WithdrawalHash, WithdrawalStatus},
};
use alloy_contract::private::Provider;
use alloy_primitives::Address;
use alloy_rpc_types_eth::{BlockNumberOrTag, Log};
use binding::opstack::{
    IL2ToL1MessagePasser::{self, MessagePassed},
    WithdrawalTransaction,
};
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, error, warn};

/// Blocks per `eth_getLogs` request, below the common 10k provider limit.
const CHUNK_SIZE: u64 = 9_500;

/// A withdrawal seen on L2 that has not been finalized yet.
#[derive(Debug, Clone)]
pub struct PendingWithdrawal {
    pub event: WithdrawalEvent,
    pub status: WithdrawalStatus,
}

/// Current status of `hash` as seen by the portal for `proof_submitter`.
pub async fn query_withdrawal_status<L1: Portal>(
    portal: &L1,
    hash: WithdrawalHash,
    proof_submitter: Address,
) -> eyre::Result<WithdrawalStatus> {
    if portal.is_finalized(hash).await? {
        return Ok(WithdrawalStatus::Finalized);
    }

    if let Some(proven) = portal.proven_withdrawal(hash, proof_submitter).await? {
        return Ok(WithdrawalStatus::Proven {
            timestamp: proven.timestamp,
            dispute_game_proxy: proven.dispute_game_proxy,
        });
    }

    Ok(WithdrawalStatus::Initiated)
}

/// Extract withdrawals from `MessagePassed` logs emitted by `message_passer`.
///
/// Logs whose emitted hash does not match the recomputed one are dropped
/// with an error; they can never be proven.
pub fn parse_message_passed(logs: &[Log], message_passer: Address) -> Vec<WithdrawalEvent> {
    logs.iter()
        .filter(|log| log.address() == message_passer)
        .filter_map(|log| {
            let decoded = log.log_decode::<MessagePassed>().ok()?;
            let event = decoded.inner.data;
            let transaction = WithdrawalTransaction {
                nonce: event.nonce,
                sender: event.sender,
                target: event.target,
                value: event.value,
                gasLimit: event.gasLimit,
                data: event.data,
            };

            let computed = compute_withdrawal_hash(&transaction);
            if computed != event.withdrawalHash {
                error!(
                    block = ?log.block_number,
                    computed_hash = %computed,
                    withdrawal_hash = %event.withdrawalHash,
                    "Withdrawal hash mismatch, skipping"
                );
                return None;
            }

            Some(WithdrawalEvent {
                transaction,
                hash: event.withdrawalHash,
                l2_block: log.block_number.unwrap_or_default(),
            })
        })
        .collect()
}

/// Scans L2 for withdrawals and joins them with their L1 status.
pub struct WithdrawalStateProvider<L1, P2> {
    l1: L1,
    l2_provider: P2,
    message_passer_address: Address,
}

impl<L1, P2> WithdrawalStateProvider<L1, P2>
where
    L1: Portal,
    P2: Provider + Clone,
{
    pub const fn new(l1: L1, l2_provider: P2, message_passer_address: Address) -> Self {
        Self {
            l1,
            l2_provider,
            message_passer_address,
        }
    }

    pub async fn query_withdrawal_status(
        &self,
        hash: WithdrawalHash,
        proof_submitter: Address,
    ) -> eyre::Result<WithdrawalStatus> {
        query_withdrawal_status(&self.l1, hash, proof_submitter).await
    }

    /// All unfinalized withdrawals emitted in `[from_block, to_block]`.
    ///
    /// Both ends are resolved to concrete numbers first so that a load
    /// balanced RPC cannot move `latest` between chunks.
    pub async fn get_pending_withdrawals(
        &self,
        from_block: BlockNumberOrTag,
        to_block: BlockNumberOrTag,
        proof_submitter: Address,
    ) -> eyre::Result<Vec<PendingWithdrawal>> {
        let from_block_num = self.resolve_block_number(from_block).await?;
        let to_block_num = self.resolve_block_number(to_block).await?;

        if from_block_num > to_block_num {
            return Err(eyre::eyre!(
                "from_block ({}) must be <= to_block ({})",
                from_block_num,
                to_block_num
            ));
        }

        debug!(
            from = from_block_num,
            to = to_block_num,
            "Scanning for withdrawals (snapshot taken)"
        );

        let mut pending = Vec::new();
        for (from, to) in chunks(from_block_num, to_block_num) {
            for event in self.scan_chunk_with_retry(from, to).await? {
                let status = self
                    .query_withdrawal_status(event.hash, proof_submitter)
                    .await?;
                if status == WithdrawalStatus::Finalized {
                    continue;
                }
                pending.push(PendingWithdrawal { event, status });
            }
        }

        Ok(pending)
    }

    async fn resolve_block_number(&self, block: BlockNumberOrTag) -> eyre::Result<u64> {
        match block {
            BlockNumberOrTag::Number(n) => Ok(n),
            BlockNumberOrTag::Latest => Ok(self.l2_provider.get_block_number().await?),
            _ => Err(eyre::eyre!("Unsupported block tag: {:?}", block)),
        }
    }

    async fn scan_chunk_with_retry(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> eyre::Result<Vec<WithdrawalEvent>> {
        // 100ms, 200ms, 400ms, 800ms, 1.6s
        let retry_strategy = ExponentialBackoff::from_millis(2).factor(50).take(5);

        Retry::spawn(retry_strategy, || async {
            self.scan_chunk(from_block, to_block).await.map_err(|e| {
                warn!(
                    from = from_block,
                    to = to_block,
                    error = %e,
                    "Chunk scan failed, will retry"
                );
                e
            })
        })
        .await
    }

    async fn scan_chunk(&self, from_block: u64, to_block: u64) -> eyre::Result<Vec<WithdrawalEvent>> {
        debug!(from = from_block, to = to_block, "Scanning chunk for withdrawals");
        let contract = IL2ToL1MessagePasser::new(self.message_passer_address, &self.l2_provider);
        let logs: Vec<Log> = contract
            .MessagePassed_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query()
            .await?
            .into_iter()
            .map(|(_, log)| log)
            .collect();

        Ok(parse_message_passed(&logs, self.message_passer_address))
    }
}

/// Inclusive `[from, to]` ranges of at most `CHUNK_SIZE` blocks.
fn chunks(from: u64, to: u64) -> impl Iterator<Item = (u64, u64)> {
    let mut current = Some(from).filter(|f| *f <= to);
    std::iter::from_fn(move || {
        let start = current?;
        let end = start.saturating_add(CHUNK_SIZE - 1).min(to);
        current = end.checked_add(1).filter(|next| *next <= to);
        Some((start, end))
    })
}
