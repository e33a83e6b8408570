//! JSON-RPC implementations of the chain traits.

use crate::{
    chain::{DisputeGame, GameFactory, L1Clock, L2Chain, Portal},
    types::{AccountProof, BlockRef, GameStatus, ProvenWithdrawal, StorageProof, WithdrawalHash},
};
use alloy_contract::private::Provider;
use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types_eth::{BlockNumberOrTag, EIP1186AccountProofResponse};
use binding::opstack::{
    IDisputeGameFactory::{self, GameSearchResult},
    IFaultDisputeGame, IOptimismPortal2,
};
use eyre::eyre;
use tracing::debug;

/// Settlement-layer contracts behind a provider.
#[derive(Debug, Clone)]
pub struct RpcL1<P> {
    provider: P,
    portal: Address,
    factory: Address,
}

impl<P> RpcL1<P>
where
    P: Provider + Clone,
{
    pub const fn new(provider: P, portal: Address, factory: Address) -> Self {
        Self {
            provider,
            portal,
            factory,
        }
    }

    /// Look up the factory the portal trusts and bind to both.
    pub async fn connect(provider: P, portal: Address) -> eyre::Result<Self> {
        let factory = IOptimismPortal2::new(portal, &provider)
            .disputeGameFactory()
            .call()
            .await?;
        debug!(%portal, %factory, "Resolved dispute game factory from portal");
        Ok(Self::new(provider, portal, factory))
    }

    pub const fn factory_address(&self) -> Address {
        self.factory
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> Portal for RpcL1<P>
where
    P: Provider + Clone,
{
    fn portal_address(&self) -> Address {
        self.portal
    }

    async fn dispute_game_factory(&self) -> eyre::Result<Address> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        Ok(portal.disputeGameFactory().call().await?)
    }

    async fn respected_game_type(&self) -> eyre::Result<u32> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        Ok(portal.respectedGameType().call().await?)
    }

    async fn proven_withdrawal(
        &self,
        hash: WithdrawalHash,
        submitter: Address,
    ) -> eyre::Result<Option<ProvenWithdrawal>> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        let proven = portal.provenWithdrawals(hash, submitter).call().await?;

        if proven.timestamp == 0 {
            Ok(None)
        } else {
            Ok(Some(ProvenWithdrawal {
                dispute_game_proxy: proven.disputeGameProxy,
                timestamp: proven.timestamp,
            }))
        }
    }

    async fn is_finalized(&self, hash: WithdrawalHash) -> eyre::Result<bool> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        Ok(portal.finalizedWithdrawals(hash).call().await?)
    }

    async fn proof_maturity_delay(&self) -> eyre::Result<u64> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        let delay: U256 = portal.proofMaturityDelaySeconds().call().await?;
        Ok(delay.try_into().unwrap_or(u64::MAX))
    }

    async fn dispute_game_finality_delay(&self) -> eyre::Result<u64> {
        let portal = IOptimismPortal2::new(self.portal, &self.provider);
        let delay: U256 = portal.disputeGameFinalityDelaySeconds().call().await?;
        Ok(delay.try_into().unwrap_or(u64::MAX))
    }
}

impl<P> GameFactory for RpcL1<P>
where
    P: Provider + Clone,
{
    async fn game_count(&self) -> eyre::Result<U256> {
        let factory = IDisputeGameFactory::new(self.factory, &self.provider);
        Ok(factory.gameCount().call().await?)
    }

    async fn find_latest_games(
        &self,
        game_type: u32,
        start: U256,
        n: U256,
    ) -> eyre::Result<Vec<GameSearchResult>> {
        let factory = IDisputeGameFactory::new(self.factory, &self.provider);
        Ok(factory.findLatestGames(game_type, start, n).call().await?)
    }
}

impl<P> DisputeGame for RpcL1<P>
where
    P: Provider + Clone,
{
    async fn status(&self, game: Address) -> eyre::Result<GameStatus> {
        let contract = IFaultDisputeGame::new(game, &self.provider);
        let raw = contract.status().call().await?;
        GameStatus::try_from(raw).map_err(|s| eyre!("game {} reported unknown status {}", game, s))
    }

    async fn claim_clock_expired(&self, game: Address, claim: U256) -> eyre::Result<bool> {
        let contract = IFaultDisputeGame::new(game, &self.provider);
        let max_clock = contract.maxClockDuration().call().await?;
        let elapsed = contract.getChallengerDuration(claim).call().await?;
        debug!(%game, %claim, elapsed, max_clock, "Checked claim clock");
        Ok(elapsed >= max_clock)
    }

    async fn claim_resolved(&self, game: Address, claim: U256) -> eyre::Result<bool> {
        let contract = IFaultDisputeGame::new(game, &self.provider);
        Ok(contract.resolvedSubgames(claim).call().await?)
    }

    async fn resolved_at(&self, game: Address) -> eyre::Result<u64> {
        let contract = IFaultDisputeGame::new(game, &self.provider);
        Ok(contract.resolvedAt().call().await?)
    }
}

impl<P> L1Clock for RpcL1<P>
where
    P: Provider + Clone,
{
    async fn latest_timestamp(&self) -> eyre::Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| eyre!("Failed to get latest block"))?;
        Ok(block.header.timestamp)
    }
}

/// Origin-chain reads behind a provider.
#[derive(Debug, Clone)]
pub struct RpcL2<P> {
    provider: P,
}

impl<P> RpcL2<P>
where
    P: Provider + Clone,
{
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> L2Chain for RpcL2<P>
where
    P: Provider + Clone,
{
    async fn block_ref(&self, number: u64) -> eyre::Result<BlockRef> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?
            .ok_or_else(|| eyre!("Block not found: {}", number))?;

        Ok(BlockRef {
            number: block.header.number,
            hash: block.header.hash,
            state_root: block.header.state_root,
            timestamp: block.header.timestamp,
        })
    }

    async fn get_proof(&self, address: Address, slot: B256, block: u64) -> eyre::Result<AccountProof> {
        let response = self
            .provider
            .get_proof(address, vec![slot])
            .block_id(BlockNumberOrTag::Number(block).into())
            .await?;
        Ok(response.into())
    }
}

impl From<EIP1186AccountProofResponse> for AccountProof {
    fn from(response: EIP1186AccountProofResponse) -> Self {
        Self {
            address: response.address,
            balance: response.balance,
            nonce: response.nonce,
            code_hash: response.code_hash,
            storage_hash: response.storage_hash,
            account_proof: response.account_proof,
            storage_proof: response
                .storage_proof
                .into_iter()
                .map(|entry| StorageProof {
                    key: entry.key.as_b256(),
                    value: entry.value,
                    proof: entry.proof,
                })
                .collect(),
        }
    }
}
