//! RPC providers, transaction signing and submission.
//!
//! The finalizer never talks to a wallet directly: every write goes through a
//! [`TxSubmitter`], which fills, signs, broadcasts and waits for a transaction
//! while charging its gas against a shared [`GasBudget`].

mod budget;
mod submit;

pub use budget::{GasBudget, Overdraft};
pub use submit::{IncludedTx, SubmitError, Submitter, TxCandidate, TxSubmitter};

use alloy_consensus::TxEnvelope;
use alloy_network::{eip2718::Encodable2718, EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportResult;
use std::{future::Future, pin::Pin, sync::Arc};
use thiserror::Error;

/// A function that signs a transaction request and returns signed bytes.
///
/// The request handed to the signer is already filled (nonce, fees, gas).
pub type SignerFn = Arc<
    dyn Fn(TransactionRequest) -> Pin<Box<dyn Future<Output = eyre::Result<Bytes>> + Send>>
        + Send
        + Sync,
>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Error parsing or validating URLs
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// Error connecting to the RPC endpoint
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error with private key
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
}

/// Convenience function to create an ethereum rpc provider from url.
pub async fn create_provider(rpc_url: &str) -> Result<impl Provider + Clone, ClientError> {
    let url = rpc_url
        .parse()
        .map_err(|e| ClientError::InvalidUrl(format!("{}", e)))?;
    let provider = ProviderBuilder::new().connect_http(url);

    Ok(provider)
}

/// Create a provider with wallet signing capability from a private key.
pub fn create_wallet_provider(
    rpc_url: &str,
    private_key: &str,
) -> Result<impl Provider + Clone, ClientError> {
    let url = rpc_url
        .parse()
        .map_err(|e| ClientError::InvalidUrl(format!("{}", e)))?;

    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|e| ClientError::InvalidPrivateKey(format!("{}", e)))?;

    let wallet = EthereumWallet::from(signer);

    let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

    Ok(provider)
}

/// Parse a private key and return the address it signs for.
pub fn signer_address(private_key: &str) -> Result<Address, ClientError> {
    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|e| ClientError::InvalidPrivateKey(format!("{}", e)))?;
    Ok(signer.address())
}

/// Create a SignerFn from a local private key.
///
/// The returned function expects a filled request (see [`fill_transaction`])
/// and produces EIP-2718 encoded bytes ready for `eth_sendRawTransaction`.
pub fn local_signer_fn(private_key: &str) -> Result<SignerFn, ClientError> {
    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|e| ClientError::InvalidPrivateKey(format!("{}", e)))?;
    let wallet = EthereumWallet::from(signer);

    Ok(Arc::new(move |tx: TransactionRequest| {
        let wallet = wallet.clone();
        Box::pin(async move {
            let tx_envelope: TxEnvelope = tx
                .build(&wallet)
                .await
                .map_err(|e| eyre::eyre!("{}", e))?;

            let mut encoded = Vec::new();
            tx_envelope.encode_2718(&mut encoded);
            Ok(Bytes::from(encoded))
        })
    }))
}

/// Fill missing transaction fields using the provider.
///
/// Gas estimation runs last, so a call that would revert surfaces here as an
/// RPC error before anything is broadcast.
pub async fn fill_transaction<P>(
    mut tx: TransactionRequest,
    provider: &P,
    from: Address,
    chain_id: u64,
) -> TransportResult<TransactionRequest>
where
    P: Provider,
{
    if tx.from.is_none() {
        tx.from = Some(from);
    }

    if tx.chain_id.is_none() {
        tx.chain_id = Some(chain_id);
    }

    if tx.nonce.is_none() {
        // pending, so back-to-back sends from one account do not collide
        let nonce = provider.get_transaction_count(from).pending().await?;
        tx.nonce = Some(nonce);
    }

    // Fee parameters first, gas estimation may need them
    if tx.max_fee_per_gas.is_none() || tx.max_priority_fee_per_gas.is_none() {
        let fee_estimate = provider.estimate_eip1559_fees().await?;
        if tx.max_fee_per_gas.is_none() {
            tx.max_fee_per_gas = Some(fee_estimate.max_fee_per_gas);
        }
        if tx.max_priority_fee_per_gas.is_none() {
            tx.max_priority_fee_per_gas = Some(fee_estimate.max_priority_fee_per_gas);
        }
    }

    if tx.gas.is_none() {
        let gas_estimate = provider.estimate_gas(tx.clone()).await?;
        // 20% headroom
        tx.gas = Some(gas_estimate + gas_estimate / 5);
    }

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url() {
        let result = create_provider("not a url").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            local_signer_fn("0xnot-a-key"),
            Err(ClientError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_signer_address() {
        // anvil's first default account
        let address = signer_address(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(
            address,
            alloy_primitives::address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }
}
