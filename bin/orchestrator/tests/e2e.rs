//! End-to-end runs against the configured testnet.

use crate::setup::{load_private_key, load_test_config, setup_chains, setup_provider};
use action::{
    deposit::{Deposit, DepositAction},
    withdraw::{initiated, Withdraw, WithdrawAction},
    Action,
};
use alloy_primitives::{utils::parse_ether, Bytes, U256};
use alloy_provider::Provider;
use binding::opstack::{IFaultDisputeGame, IOptimismPortal2};
use client::{GasBudget, Submitter};
use orchestrator::{scan_pending, Finalizer, Outcome};
use tokio::sync::watch;
use withdrawal::Portal;


fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
#[ignore = "requires RPC access and a funded key - run with: cargo test -p orchestrator --test e2e -- --ignored scan"]
async fn test_scan_pending_withdrawals() {
    init_tracing();
    let config = load_test_config();
    let chains = setup_chains(&config).await;

    let pending = scan_pending(&chains, &config).await.unwrap();

    println!("Found {} pending withdrawals", pending.len());
    for withdrawal in &pending {
        println!(
            "  {} from L2 block {}: {:?}",
            withdrawal.event.hash, withdrawal.event.l2_block, withdrawal.status
        );
        assert_eq!(withdrawal.event.transaction.sender, config.eoa_address);
    }
}

#[tokio::test]
#[ignore = "submits real transactions and can run for days - run with: cargo test -p orchestrator --test e2e -- --ignored finalize"]
async fn test_finalize_oldest_pending_withdrawal() {
    init_tracing();
    let config = load_test_config();
    let chains = setup_chains(&config).await;

    let pending = scan_pending(&chains, &config).await.unwrap();
    let Some(oldest) = pending.into_iter().min_by_key(|w| w.event.l2_block) else {
        println!("No pending withdrawals for {}", config.eoa_address);
        return;
    };
    println!("Finalizing {} from L2 block {}", oldest.event.hash, oldest.event.l2_block);

    let (_shutdown, rx) = watch::channel(false);
    let finalizer = Finalizer::new(chains.l1, chains.l2, chains.submitter, config.timings, rx);
    let Outcome::Finalized { receipt } = finalizer.run(&oldest.event).await.unwrap();

    match receipt {
        Some(receipt) => println!("Finalized in {}", receipt.tx_hash),
        None => println!("Finalized by another party"),
    }
}

/// Deposit, withdraw the same amount and drive it to finalization on a devnet
/// with short dispute clocks.
#[tokio::test]
#[ignore = "submits real transactions on a devnet - run with: cargo test -p orchestrator --test e2e -- --ignored round_trip"]
async fn test_round_trip() {
    init_tracing();
    let config = load_test_config();
    let network = config.network_config();
    let amount = parse_ether("0.1").unwrap();
    let private_key = load_private_key().expect("private key required");

    let l1_provider = setup_provider(&config.l1_rpc_url).await;
    let l2_provider = setup_provider(&config.l2_rpc_url).await;
    let chains = setup_chains(&config).await;
    let budget = chains.submitter.budget().clone();

    // deposit first so the L2 side can pay for the withdrawal
    let deposit = DepositAction::new(
        l1_provider.clone(),
        chains.submitter.clone(),
        Deposit::eth(network.l1.standard_bridge, amount),
    );
    assert!(deposit.is_ready().await.unwrap());
    let included = deposit.execute().await.unwrap();
    println!("Deposited in {}", included.tx_hash);

    let l2_submitter = Submitter::new(
        l2_provider.clone(),
        client::local_signer_fn(&private_key).unwrap(),
        config.eoa_address,
        network.l2.chain_id,
        GasBudget::unlimited(),
        config.receipt_timeout(),
    );
    let withdraw = WithdrawAction::new(
        l2_provider.clone(),
        l2_submitter,
        Withdraw {
            target: config.eoa_address,
            value: amount,
            gas_limit: U256::from(100_000),
            data: Bytes::new(),
            tx_hash: None,
        },
    );
    // the deposit may take a few L2 blocks to be credited
    while !withdraw.is_ready().await.unwrap() {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
    let included = withdraw.execute().await.unwrap();
    let event = initiated(&included).unwrap();
    println!("Withdrawal {} initiated in {}", event.hash, included.tx_hash);

    let start_block = l1_provider.get_block_number().await.unwrap();
    let balance_before = l1_provider.get_balance(config.eoa_address).await.unwrap();
    let budget_before = budget.remaining();

    let l1 = chains.l1.clone();
    let (_shutdown, rx) = watch::channel(false);
    let finalizer = Finalizer::new(chains.l1, chains.l2, chains.submitter, config.timings, rx);
    let Outcome::Finalized { receipt } = finalizer.run(&event).await.unwrap();
    assert!(receipt.is_some(), "finalized by another party");

    let balance_after = l1_provider.get_balance(config.eoa_address).await.unwrap();
    let fees = budget_before - budget.remaining();
    assert_eq!(balance_after + fees, balance_before + amount);

    let portal = IOptimismPortal2::new(network.l1.portal, &l1_provider);
    let proven = portal
        .WithdrawalProven_filter()
        .topic1(event.hash)
        .from_block(start_block)
        .query()
        .await
        .unwrap();
    assert_eq!(proven.len(), 1);
    let extension = portal
        .WithdrawalProvenExtension1_filter()
        .topic1(event.hash)
        .topic2(config.eoa_address.into_word())
        .from_block(start_block)
        .query()
        .await
        .unwrap();
    assert_eq!(extension.len(), 1);

    let game = l1
        .proven_withdrawal(event.hash, config.eoa_address)
        .await
        .unwrap()
        .expect("proof recorded")
        .dispute_game_proxy;
    let resolved = IFaultDisputeGame::new(game, &l1_provider)
        .Resolved_filter()
        .from_block(start_block)
        .query()
        .await
        .unwrap();
    assert_eq!(resolved.len(), 1);

    let finalized = portal
        .WithdrawalFinalized_filter()
        .topic1(event.hash)
        .from_block(start_block)
        .query()
        .await
        .unwrap();
    let [(finalized, _)] = finalized.as_slice() else {
        panic!("expected one WithdrawalFinalized event, got {}", finalized.len());
    };
    assert!(finalized.success);
}
