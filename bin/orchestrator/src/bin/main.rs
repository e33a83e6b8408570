use clap::Parser;
use orchestrator::{
    config::Config,
    connect,
    metrics::{install_prometheus_exporter, Metrics},
    run_daemon,
};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Prove and finalize L2 to L1 withdrawals")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Private key for signing transactions (hex string, with or without 0x prefix)
    #[arg(short = 'k', long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: String,
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

    let signer_address = client::signer_address(&cli.private_key)?;
    if signer_address != config.eoa_address {
        eyre::bail!(
            "private key signs for {}, but config eoa_address is {}",
            signer_address,
            config.eoa_address
        );
    }

    info!("Starting Orchestrator");
    info!("  Network: {:?}", config.network);
    info!("  L1 RPC URL: {}", config.l1_rpc_url);
    info!("  L2 RPC URL: {}", config.l2_rpc_url);
    info!("  L1 Portal: {}", network.l1.portal);
    info!("  EOA: {}", config.eoa_address);

    if let Some(port) = config.metrics_port {
        install_prometheus_exporter(port)?;
        info!(port, "Prometheus exporter listening");
    }
    let metrics = Metrics::new();

    let l1_provider = client::create_provider(&config.l1_rpc_url).await?;
    let l2_provider = client::create_provider(&config.l2_rpc_url).await?;
    let signer = client::local_signer_fn(&cli.private_key)?;
    let chains = connect(l1_provider, l2_provider, &config, signer).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received ctrl-c, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for ctrl-c, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    run_daemon(chains, &config, metrics, shutdown_rx).await?;
    info!("Orchestrator stopped");
    Ok(())
}
