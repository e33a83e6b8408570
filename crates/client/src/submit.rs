//! Gas-budgeted transaction inclusion.

use crate::{budget::Overdraft, fill_transaction, GasBudget, SignerFn};
use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_provider::Provider;
use alloy_rpc_types::TransactionRequest;
use alloy_rpc_types_eth::Log;
use alloy_transport::TransportError;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// JSON-RPC error code geth-compatible nodes use for `execution reverted`.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Calldata for a single contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCandidate {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl TxCandidate {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
        }
    }
}

/// A transaction that made it into a block with a successful status.
#[derive(Debug, Clone)]
pub struct IncludedTx {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// `gas_used * effective_gas_price`, in wei
    pub fee: U256,
    pub logs: Vec<Log>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The call reverted, either during gas estimation or on chain.
    #[error("transaction {} reverted: {reason}", .tx_hash.map_or_else(|| "estimate".to_string(), |h| h.to_string()))]
    Reverted {
        tx_hash: Option<TxHash>,
        reason: String,
    },

    #[error(transparent)]
    Overdraft(#[from] Overdraft),

    #[error("signing failed: {0}")]
    Signing(String),

    /// The node could not be reached or answered with a non-revert error.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

impl SubmitError {
    /// Split an RPC error into a revert or a transport failure.
    pub fn from_rpc(err: TransportError) -> Self {
        if let Some(payload) = err.as_error_resp() {
            if payload.code == EXECUTION_REVERTED_CODE || payload.message.contains("revert") {
                return Self::Reverted {
                    tx_hash: None,
                    reason: payload.message.to_string(),
                };
            }
        }
        Self::Transport(Box::new(err))
    }

    pub const fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }

    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Sends transactions and waits for their inclusion.
pub trait TxSubmitter: Send + Sync {
    /// Account that signs every submitted transaction.
    fn sender(&self) -> Address;

    /// Submit a call and wait for its receipt.
    ///
    /// A mined transaction with a failed status is reported as
    /// [`SubmitError::Reverted`] carrying its hash.
    fn include(
        &self,
        candidate: TxCandidate,
    ) -> impl Future<Output = Result<IncludedTx, SubmitError>> + Send;
}

/// [`TxSubmitter`] backed by a JSON-RPC provider and a [`SignerFn`].
#[derive(Clone)]
pub struct Submitter<P> {
    provider: P,
    signer: SignerFn,
    from: Address,
    chain_id: u64,
    budget: GasBudget,
    receipt_timeout: Duration,
    // serializes nonce assignment across concurrent withdrawals
    send_lock: Arc<Mutex<()>>,
}

impl<P> Submitter<P>
where
    P: Provider + Clone,
{
    pub fn new(
        provider: P,
        signer: SignerFn,
        from: Address,
        chain_id: u64,
        budget: GasBudget,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            signer,
            from,
            chain_id,
            budget,
            receipt_timeout,
            send_lock: Arc::new(Mutex::new(())),
        }
    }

    pub const fn budget(&self) -> &GasBudget {
        &self.budget
    }

    /// Release reservations of earlier transactions that were mined after
    /// their receipt wait gave up.
    async fn settle_held(&self) {
        for tx_hash in self.budget.held() {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    let fee =
                        U256::from(receipt.gas_used) * U256::from(receipt.effective_gas_price);
                    if self.budget.settle(tx_hash, fee) {
                        debug!(%tx_hash, fee_wei = %fee, "Held reservation settled");
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(%tx_hash, error = %e, "Held transaction lookup failed"),
            }
        }
    }

    async fn broadcast(&self, candidate: TxCandidate) -> Result<(TxHash, U256), SubmitError> {
        let _guard = self.send_lock.lock().await;

        let request = TransactionRequest::default()
            .with_to(candidate.to)
            .with_input(candidate.data)
            .with_value(candidate.value);
        let filled = fill_transaction(request, &self.provider, self.from, self.chain_id)
            .await
            .map_err(SubmitError::from_rpc)?;

        let reserved = U256::from(filled.gas.unwrap_or_default())
            * U256::from(filled.max_fee_per_gas.unwrap_or_default());
        self.budget.debit(reserved)?;

        let signed = match (self.signer)(filled).await {
            Ok(signed) => signed,
            Err(e) => {
                self.budget.credit(reserved);
                return Err(SubmitError::Signing(format!("{e:#}")));
            }
        };

        match self.provider.send_raw_transaction(&signed).await {
            Ok(pending) => Ok((*pending.tx_hash(), reserved)),
            Err(e) => {
                self.budget.credit(reserved);
                Err(SubmitError::from_rpc(e))
            }
        }
    }
}

impl<P> TxSubmitter for Submitter<P>
where
    P: Provider + Clone,
{
    fn sender(&self) -> Address {
        self.from
    }

    async fn include(&self, candidate: TxCandidate) -> Result<IncludedTx, SubmitError> {
        let to = candidate.to;
        self.settle_held().await;
        let (tx_hash, reserved) = self.broadcast(candidate).await?;
        debug!(%tx_hash, %to, reserved_wei = %reserved, "Transaction broadcast");

        let receipt = alloy_provider::PendingTransactionBuilder::new(
            self.provider.root().clone(),
            tx_hash,
        )
        .with_timeout(Some(self.receipt_timeout))
        .get_receipt()
        .await
        .map_err(|e| {
            // fee unknown until the transaction is seen mined
            warn!(%tx_hash, error = %e, "Receipt wait failed");
            self.budget.hold(tx_hash, reserved);
            SubmitError::Transport(Box::new(e))
        })?;

        let fee = U256::from(receipt.gas_used) * U256::from(receipt.effective_gas_price);
        self.budget.credit(reserved.saturating_sub(fee));

        if !receipt.status() {
            return Err(SubmitError::Reverted {
                tx_hash: Some(tx_hash),
                reason: "receipt status is failure".to_string(),
            });
        }

        Ok(IncludedTx {
            tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            fee,
            logs: receipt.logs().to_vec(),
        })
    }
}
