//! Initiate withdrawal action on L2.

use crate::{Action, ActionError, IncludedTx, TxCandidate, TxSubmitter};
use alloy_primitives::{utils::format_ether, Address, Bytes, B256, U256};
use alloy_provider::Provider;
use alloy_sol_types::SolCall;
use binding::opstack::{IL2ToL1MessagePasser, MESSAGE_PASSER_ADDRESS};
use tracing::info;
use withdrawal::{state::parse_message_passed, WithdrawalEvent};

/// Withdraw input data.
#[derive(Debug, Clone)]
pub struct Withdraw {
    pub target: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub data: Bytes,
    /// Set once the initiating transaction is known
    pub tx_hash: Option<B256>,
}

/// The withdrawal emitted by an included `initiateWithdrawal` transaction.
pub fn initiated(included: &IncludedTx) -> Result<WithdrawalEvent, ActionError> {
    let mut events = parse_message_passed(&included.logs, MESSAGE_PASSER_ADDRESS);
    match events.len() {
        1 => Ok(events.remove(0)),
        n => Err(ActionError::Read(eyre::eyre!(
            "expected one MessagePassed event in {}, found {}",
            included.tx_hash,
            n
        ))),
    }
}

pub struct WithdrawAction<P, S> {
    provider: P,
    submitter: S,
    action: Withdraw,
}

impl<P, S> WithdrawAction<P, S>
where
    P: Provider + Clone,
    S: TxSubmitter,
{
    pub const fn new(provider: P, submitter: S, action: Withdraw) -> Self {
        Self {
            provider,
            submitter,
            action,
        }
    }

    fn matches(&self, event: &WithdrawalEvent) -> bool {
        let tx = &event.transaction;
        tx.sender == self.submitter.sender()
            && tx.target == self.action.target
            && tx.value == self.action.value
            && tx.gasLimit == self.action.gas_limit
            && tx.data == self.action.data
    }
}

impl<P, S> Action for WithdrawAction<P, S>
where
    P: Provider + Clone,
    S: TxSubmitter,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        if self.action.value == U256::ZERO || self.action.target == Address::ZERO {
            return Ok(false);
        }

        let balance = self.provider.get_balance(self.submitter.sender()).await?;
        Ok(balance >= self.action.value)
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        let Some(tx_hash) = self.action.tx_hash else {
            return Ok(false);
        };

        let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? else {
            return Ok(false);
        };

        let events = parse_message_passed(receipt.logs(), MESSAGE_PASSER_ADDRESS);
        Ok(events.iter().any(|event| self.matches(event)))
    }

    async fn execute(&self) -> Result<IncludedTx, ActionError> {
        if self.is_completed().await? {
            return Err(ActionError::AlreadyCompleted(self.description()));
        }

        let data = IL2ToL1MessagePasser::initiateWithdrawalCall {
            _target: self.action.target,
            _gasLimit: self.action.gas_limit,
            _data: self.action.data.clone(),
        }
        .abi_encode();
        let candidate = TxCandidate {
            to: MESSAGE_PASSER_ADDRESS,
            data: data.into(),
            value: self.action.value,
        };
        let included = self.submitter.include(candidate).await?;

        let event = initiated(&included)?;
        info!(
            tx_hash = %included.tx_hash,
            block_number = included.block_number,
            gas_used = included.gas_used,
            withdrawal_hash = %event.hash,
            "Withdrawal initiated"
        );
        Ok(included)
    }

    fn description(&self) -> String {
        format!(
            "Withdrawing {} ETH to {} on L1",
            format_ether(self.action.value),
            self.action.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSubmitter;
    use alloy_primitives::Log as PrimitiveLog;
    use alloy_provider::{network::Ethereum, RootProvider};
    use alloy_rpc_types_eth::Log;
    use alloy_sol_types::SolEvent;
    use binding::opstack::IL2ToL1MessagePasser::MessagePassed;
    use withdrawal::{hash::compute_withdrawal_hash, test_utils::sample_withdrawal};

    fn included_with(logs: Vec<Log>) -> IncludedTx {
        IncludedTx {
            tx_hash: B256::repeat_byte(7),
            block_number: Some(12),
            gas_used: 50_000,
            fee: U256::ZERO,
            logs,
        }
    }

    fn passed_log(nonce: u64) -> Log {
        let tx = sample_withdrawal(nonce);
        let event = MessagePassed {
            nonce: tx.nonce,
            sender: tx.sender,
            target: tx.target,
            value: tx.value,
            gasLimit: tx.gasLimit,
            data: tx.data.clone(),
            withdrawalHash: compute_withdrawal_hash(&tx),
        };
        Log {
            inner: PrimitiveLog {
                address: MESSAGE_PASSER_ADDRESS,
                data: event.encode_log_data(),
            },
            block_number: Some(12),
            ..Default::default()
        }
    }

    #[test]
    fn test_initiated_extracts_single_event() {
        let event = initiated(&included_with(vec![passed_log(4)])).unwrap();
        assert_eq!(event.transaction, sample_withdrawal(4));
        assert_eq!(event.l2_block, 12);
    }

    #[test]
    fn test_initiated_requires_exactly_one_event() {
        assert!(initiated(&included_with(vec![])).is_err());
        assert!(initiated(&included_with(vec![passed_log(1), passed_log(2)])).is_err());
    }

    #[tokio::test]
    async fn test_not_ready_without_value_or_target() {
        let provider = RootProvider::<Ethereum>::new_http("http://localhost:1".parse().unwrap());
        let withdraw = Withdraw {
            target: Address::ZERO,
            value: U256::from(1),
            gas_limit: U256::from(100_000),
            data: Bytes::new(),
            tx_hash: None,
        };
        let action = WithdrawAction::new(provider, RecordingSubmitter::default(), withdraw);

        // rejected before any RPC call
        assert!(!action.is_ready().await.unwrap());
        assert!(!action.is_completed().await.unwrap());
        assert!(action.description().contains("0.000000000000000001"));
    }
}
