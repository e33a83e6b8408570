//! CLI tool to run individual orchestrator steps for testing.
//!
//! - `scan`: List pending withdrawals and their status
//! - `withdraw`: Initiate an L2→L1 withdrawal of ETH
//! - `deposit`: Deposit ETH from L1 to L2 through the standard bridge
//! - `finalize`: Drive the withdrawals of one L2 transaction to finalization

use action::{
    deposit::{Deposit, DepositAction},
    withdraw::{Withdraw, WithdrawAction},
    Action,
};
use alloy_primitives::{
    utils::{format_ether, parse_ether},
    Bytes, TxHash, U256,
};
use alloy_provider::Provider;
use clap::{Parser, Subcommand};
use client::{GasBudget, Submitter};
use orchestrator::{config::Config, connect, scan_pending, Finalizer, Outcome};
use tokio::sync::watch;
use tracing::info;
use withdrawal::{state::parse_message_passed, WithdrawalStatus};

#[derive(Parser)]
#[command(name = "step")]
#[command(about = "Run individual orchestrator steps for testing")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Private key for signing transactions (hex string, with or without 0x prefix)
    #[arg(short = 'k', long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List pending withdrawals and their status
    Scan,

    /// Initiate a withdrawal of ETH to the same account on L1
    Withdraw {
        /// Amount in ETH
        #[arg(long)]
        amount: String,
    },

    /// Deposit ETH to the same account on L2
    Deposit {
        /// Amount in ETH
        #[arg(long)]
        amount: String,
    },

    /// Prove, resolve and finalize the withdrawals initiated by an L2 transaction
    Finalize {
        /// Hash of the L2 transaction that called initiateWithdrawal
        #[arg(long)]
        tx: TxHash,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;
    let network = config.network_config();

    info!("Loaded config:");
    info!("  Network: {:?}", config.network);
    info!("  L1 Portal: {}", network.l1.portal);
    info!("  EOA: {}", config.eoa_address);

    let l1_provider = client::create_provider(&config.l1_rpc_url).await?;
    let l2_provider = client::create_provider(&config.l2_rpc_url).await?;
    let signer = client::local_signer_fn(&cli.private_key)?;

    match cli.command {
        Command::Scan => {
            let chains = connect(l1_provider, l2_provider, &config, signer).await?;
            let pending = scan_pending(&chains, &config).await?;
            info!(count = pending.len(), "Pending withdrawals");
            for w in pending {
                let status = match w.status {
                    WithdrawalStatus::Initiated => "initiated".to_string(),
                    WithdrawalStatus::Proven { timestamp, .. } => format!("proven at {timestamp}"),
                    WithdrawalStatus::Finalized => "finalized".to_string(),
                };
                info!(
                    withdrawal_hash = %w.event.hash,
                    l2_block = w.event.l2_block,
                    value = %format_ether(w.event.transaction.value),
                    %status,
                );
            }
        }
        Command::Withdraw { amount } => {
            let submitter = Submitter::new(
                l2_provider.clone(),
                signer,
                config.eoa_address,
                network.l2.chain_id,
                GasBudget::unlimited(),
                config.receipt_timeout(),
            );
            let withdraw = Withdraw {
                target: config.eoa_address,
                value: parse_ether(&amount)?,
                gas_limit: U256::from(100_000),
                data: Bytes::new(),
                tx_hash: None,
            };
            let action = WithdrawAction::new(l2_provider, submitter, withdraw);
            if !action.is_ready().await? {
                eyre::bail!("not ready: {}", action.description());
            }
            let included = action.execute().await?;
            info!(tx_hash = %included.tx_hash, "Step completed: withdraw");
        }
        Command::Deposit { amount } => {
            let submitter = Submitter::new(
                l1_provider.clone(),
                signer,
                config.eoa_address,
                network.l1.chain_id,
                GasBudget::unlimited(),
                config.receipt_timeout(),
            );
            let deposit = Deposit::eth(network.l1.standard_bridge, parse_ether(&amount)?);
            let action = DepositAction::new(l1_provider, submitter, deposit);
            if !action.is_ready().await? {
                eyre::bail!("not ready: {}", action.description());
            }
            let included = action.execute().await?;
            info!(tx_hash = %included.tx_hash, "Step completed: deposit");
        }
        Command::Finalize { tx } => {
            let receipt = l2_provider
                .get_transaction_receipt(tx)
                .await?
                .ok_or_else(|| eyre::eyre!("receipt for {} not found", tx))?;
            let events = parse_message_passed(receipt.logs(), network.l2.message_passer);
            if events.is_empty() {
                eyre::bail!("transaction {} emitted no withdrawals", tx);
            }

            let chains = connect(l1_provider, l2_provider, &config, signer).await?;
            let (_, shutdown_rx) = watch::channel(false);
            let finalizer = Finalizer::new(
                chains.l1,
                chains.l2,
                chains.submitter,
                config.timings,
                shutdown_rx,
            );
            for event in events {
                let Outcome::Finalized { receipt } = finalizer.run(&event).await?;
                info!(
                    withdrawal_hash = %event.hash,
                    tx_hash = ?receipt.map(|r| r.tx_hash),
                    "Step completed: finalize"
                );
            }
        }
    }

    Ok(())
}
