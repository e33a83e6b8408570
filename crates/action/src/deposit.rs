//! Bridge ETH from L1 to L2 through the standard bridge.

use crate::{Action, ActionError, IncludedTx, TxCandidate, TxSubmitter};
use alloy_primitives::{utils::format_ether, Address, Bytes, B256, U256};
use alloy_provider::Provider;
use alloy_sol_types::SolCall;
use binding::opstack::IL1StandardBridge;
use tracing::info;

/// Gas the L2 side of a plain ETH deposit needs.
pub const DEFAULT_MIN_GAS_LIMIT: u32 = 200_000;

/// Deposit input data.
#[derive(Debug, Clone)]
pub struct Deposit {
    /// L1StandardBridge proxy
    pub bridge: Address,
    pub value: U256,
    pub min_gas_limit: u32,
    pub extra_data: Bytes,
    pub tx_hash: Option<B256>,
}

impl Deposit {
    pub fn eth(bridge: Address, value: U256) -> Self {
        Self {
            bridge,
            value,
            min_gas_limit: DEFAULT_MIN_GAS_LIMIT,
            extra_data: Bytes::new(),
            tx_hash: None,
        }
    }
}

/// Deposits ETH to the sender's own address on L2.
pub struct DepositAction<P, S> {
    provider: P,
    submitter: S,
    action: Deposit,
}

impl<P, S> DepositAction<P, S>
where
    P: Provider + Clone,
    S: TxSubmitter,
{
    pub const fn new(provider: P, submitter: S, action: Deposit) -> Self {
        Self {
            provider,
            submitter,
            action,
        }
    }

    fn candidate(&self) -> TxCandidate {
        let data = IL1StandardBridge::depositETHCall {
            _minGasLimit: self.action.min_gas_limit,
            _extraData: self.action.extra_data.clone(),
        }
        .abi_encode();
        TxCandidate {
            to: self.action.bridge,
            data: data.into(),
            value: self.action.value,
        }
    }
}

impl<P, S> Action for DepositAction<P, S>
where
    P: Provider + Clone,
    S: TxSubmitter,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        if self.action.value.is_zero() {
            return Ok(false);
        }
        let balance = self.provider.get_balance(self.submitter.sender()).await?;
        Ok(balance >= self.action.value)
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        let Some(tx_hash) = self.action.tx_hash else {
            return Ok(false);
        };
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.is_some_and(|r| r.status() && r.to == Some(self.action.bridge)))
    }

    async fn execute(&self) -> Result<IncludedTx, ActionError> {
        if self.is_completed().await? {
            return Err(ActionError::AlreadyCompleted(self.description()));
        }

        let included = self.submitter.include(self.candidate()).await?;
        info!(
            tx_hash = %included.tx_hash,
            block_number = included.block_number,
            gas_used = included.gas_used,
            value = %format_ether(self.action.value),
            "Deposit submitted to bridge"
        );
        Ok(included)
    }

    fn description(&self) -> String {
        format!("Depositing {} ETH to L2", format_ether(self.action.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSubmitter;
    use alloy_primitives::address;
    use alloy_provider::{network::Ethereum, RootProvider};

    #[tokio::test]
    async fn test_deposit_encodes_depositeth_with_value() {
        let bridge = address!("ea58fcA6849d79EAd1f26608855c2D6407d54Ce2");
        let provider = RootProvider::<Ethereum>::new_http("http://localhost:1".parse().unwrap());
        let submitter = RecordingSubmitter::new(Address::repeat_byte(1));
        let value = U256::from(100_000_000_000_000_000u64);

        let action = DepositAction::new(provider, submitter, Deposit::eth(bridge, value));
        action.execute().await.unwrap();

        let sent = action.submitter.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, bridge);
        assert_eq!(sent[0].value, value);
        let call = IL1StandardBridge::depositETHCall::abi_decode(&sent[0].data).unwrap();
        assert_eq!(call._minGasLimit, DEFAULT_MIN_GAS_LIMIT);
        assert!(call._extraData.is_empty());
        assert_eq!(action.description(), "Depositing 0.100000000000000000 ETH to L2");
    }
}
