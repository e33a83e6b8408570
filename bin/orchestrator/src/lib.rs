pub mod config;
pub mod finalizer;
pub mod metrics;

pub use finalizer::{Cause, FinalizeError, Finalizer, Outcome, Phase};

use crate::{config::Config, finalizer::sleep_or_shutdown, metrics::Metrics};
use alloy_provider::Provider;
use alloy_rpc_types_eth::BlockNumberOrTag;
use client::{GasBudget, SignerFn, Submitter};
use std::collections::{HashMap, HashSet};
use tokio::{
    sync::watch,
    task::{Id, JoinError, JoinSet},
};
use tracing::{error, info, warn};
use withdrawal::{
    state::{PendingWithdrawal, WithdrawalStateProvider},
    L1Chain, L2Chain, RpcL1, RpcL2, WithdrawalEvent, WithdrawalHash, WithdrawalStatus,
};

/// Everything a finalizer needs, bound to live RPC endpoints.
#[derive(Clone)]
pub struct Chains<P1, P2> {
    pub l1: RpcL1<P1>,
    pub l2: RpcL2<P2>,
    pub submitter: Submitter<P1>,
}

/// Resolve the dispute game factory and build the submitter for `config`.
pub async fn connect<P1, P2>(
    l1_provider: P1,
    l2_provider: P2,
    config: &Config,
    signer: SignerFn,
) -> eyre::Result<Chains<P1, P2>>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    let network = config.network_config();
    let l1 = RpcL1::connect(l1_provider.clone(), network.l1.portal).await?;
    let l2 = RpcL2::new(l2_provider);

    let budget = config
        .gas_budget_wei
        .map_or_else(GasBudget::unlimited, GasBudget::new);
    let submitter = Submitter::new(
        l1_provider,
        signer,
        config.eoa_address,
        network.l1.chain_id,
        budget,
        config.receipt_timeout(),
    );

    info!(
        portal = %network.l1.portal,
        factory = %l1.factory_address(),
        eoa = %config.eoa_address,
        "Connected to chains"
    );
    Ok(Chains { l1, l2, submitter })
}

/// Unfinalized withdrawals sent by the configured account within the lookback window.
pub async fn scan_pending<P1, P2>(
    chains: &Chains<P1, P2>,
    config: &Config,
) -> eyre::Result<Vec<PendingWithdrawal>>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    let network = config.network_config();
    let l2_provider = chains.l2.provider().clone();
    let head = l2_provider.get_block_number().await?;
    let from = head.saturating_sub(config.scan_lookback_blocks);

    let state =
        WithdrawalStateProvider::new(chains.l1.clone(), l2_provider, network.l2.message_passer);
    let pending = state
        .get_pending_withdrawals(
            BlockNumberOrTag::Number(from),
            BlockNumberOrTag::Number(head),
            config.eoa_address,
        )
        .await?;

    Ok(pending
        .into_iter()
        .filter(|w| w.event.transaction.sender == config.eoa_address)
        .collect())
}

/// Scan for pending withdrawals and run one finalizer per withdrawal until
/// `shutdown` is raised. In-flight finalizers are cancelled and awaited
/// before returning.
pub async fn run_daemon<P1, P2>(
    chains: Chains<P1, P2>,
    config: &Config,
    metrics: Metrics,
    shutdown: watch::Receiver<bool>,
) -> eyre::Result<()>
where
    P1: Provider + Clone + 'static,
    P2: Provider + Clone + 'static,
{
    let mut tasks = JoinSet::new();
    let mut active: HashMap<Id, WithdrawalHash> = HashMap::new();
    // failed for good, skipped until restart
    let mut abandoned: HashSet<WithdrawalHash> = HashSet::new();

    loop {
        while let Some(joined) = tasks.try_join_next_with_id() {
            abandoned.extend(report(joined, &mut active));
        }

        metrics.record_scan();
        match scan_pending(&chains, config).await {
            Ok(pending) => {
                record_pending(&metrics, &pending);
                for withdrawal in pending {
                    let hash = withdrawal.event.hash;
                    if abandoned.contains(&hash) || active.values().any(|h| *h == hash) {
                        continue;
                    }
                    let finalizer = Finalizer::new(
                        chains.l1.clone(),
                        chains.l2.clone(),
                        chains.submitter.clone(),
                        config.timings,
                        shutdown.clone(),
                    )
                    .with_metrics(metrics.clone());
                    let handle = tasks.spawn(run_finalizer(finalizer, withdrawal.event));
                    active.insert(handle.id(), hash);
                }
            }
            Err(e) => warn!(error = %e, "Withdrawal scan failed, retrying next cycle"),
        }

        metrics.set_active_finalizers(active.len());
        metrics.set_gas_budget_remaining(chains.submitter.budget().remaining());

        if sleep_or_shutdown(config.scan_interval(), &shutdown).await {
            break;
        }
    }

    info!(in_flight = tasks.len(), "Shutting down, waiting for finalizers");
    while let Some(joined) = tasks.join_next_with_id().await {
        report(joined, &mut active);
    }
    Ok(())
}

/// Run one finalizer to completion, tagging the result with its withdrawal.
pub async fn run_finalizer<L1, L2, S>(
    finalizer: Finalizer<L1, L2, S>,
    event: WithdrawalEvent,
) -> (WithdrawalHash, Result<Outcome, FinalizeError>)
where
    L1: L1Chain,
    L2: L2Chain,
    S: client::TxSubmitter,
{
    let result = finalizer.run(&event).await;
    (event.hash, result)
}

type Joined = Result<(Id, (WithdrawalHash, Result<Outcome, FinalizeError>)), JoinError>;

/// Log a finished finalizer. Returns the withdrawal if it failed permanently;
/// any other withdrawal becomes eligible again on the next scan.
fn report(joined: Joined, active: &mut HashMap<Id, WithdrawalHash>) -> Option<WithdrawalHash> {
    match joined {
        Ok((id, (hash, Ok(Outcome::Finalized { receipt })))) => {
            active.remove(&id);
            info!(
                withdrawal_hash = %hash,
                tx_hash = ?receipt.map(|r| r.tx_hash),
                "Withdrawal finalized"
            );
            None
        }
        Ok((id, (hash, Err(e)))) => {
            active.remove(&id);
            let permanent = e.cause.is_permanent();
            error!(
                withdrawal_hash = %hash,
                phase = ?e.phase,
                cause = %e.cause,
                permanent,
                "Withdrawal failed"
            );
            permanent.then_some(hash)
        }
        Err(e) => {
            let hash = active.remove(&e.id());
            error!(withdrawal_hash = ?hash, error = %e, "Finalizer task panicked");
            None
        }
    }
}

fn record_pending(metrics: &Metrics, pending: &[PendingWithdrawal]) {
    let proven = pending
        .iter()
        .filter(|w| matches!(w.status, WithdrawalStatus::Proven { .. }))
        .count();
    metrics.set_pending_withdrawals("initiated", pending.len() - proven);
    metrics.set_pending_withdrawals("proven", proven);
}
