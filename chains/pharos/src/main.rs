use anyhow::{Context, Result};
use clap::Parser;
use core_logic::{setup_logger, ProxyManager, WalletManager};
use dotenv::dotenv;
use ethers::types::Address;
use pharos_project::client::{EvmClient, EvmRouter, FaucetClient, WalletHandle};
use pharos_project::config::PharosConfig;
use pharos_project::relay::{CycleScheduler, SchedulerSettings};
use pharos_project::task::ActionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/pharos/config.toml")]
    config: String,
    /// Write a JSON metrics snapshot here on exit
    #[arg(short, long)]
    export_metrics: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _log_guard = setup_logger("logs", "pharos");

    let args = Args::parse();
    info!(target: "relay", "Loading config from: {}", args.config);
    let config = PharosConfig::load(&args.config)?;
    info!(
        target: "relay",
        "Chain {} via {} | {} steps per cycle",
        config.chain_id,
        config.rpc_url,
        config.sequence.len()
    );

    let manager = WalletManager::new()?;
    manager.require_any()?;
    let proxies = ProxyManager::load(&config.proxies_file)?;
    let router_address: Address = config
        .contracts
        .router
        .parse()
        .context("Invalid contracts.router address")?;
    let faucet_timeout = Duration::from_secs(config.faucet.timeout_seconds);

    let mut wallets = Vec::with_capacity(manager.count());
    for (index, key) in manager.keys().iter().enumerate() {
        let proxy = proxies.assign(index);
        let chain = EvmClient::connect(&config.rpc_url, config.chain_id, key, proxy, config.gas)?;
        let router = EvmRouter::new(&chain, router_address, config.gas);
        let faucet = FaucetClient::new(
            &config.faucet.base_url,
            &config.faucet.invite_code,
            proxy,
            faucet_timeout,
        )?;

        let handle = WalletHandle {
            id: WalletHandle::format_id(index),
            address: chain.address(),
            chain: Arc::new(chain),
            faucet: Arc::new(faucet),
            router: Arc::new(router),
        };
        match proxy {
            Some(_) => info!(
                target: "relay",
                "[WL:{}] {:?} (proxy #{})",
                handle.id,
                handle.address,
                index % proxies.len() + 1
            ),
            None => info!(target: "relay", "[WL:{}] {:?}", handle.id, handle.address),
        }
        wallets.push(handle);
    }
    drop(manager);

    let registry = ActionRegistry::from_config(&config)?;
    let settings = SchedulerSettings::from_config(&config)?;
    let mut scheduler = CycleScheduler::new(wallets, config.sequence.clone(), registry, settings);
    let metrics = scheduler.metrics();

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "relay", "Ctrl+C received, stopping after the current step...");
            ctrl_c_token.cancel();
        }
    });

    scheduler.run(cancel).await;

    if let Some(path) = args.export_metrics {
        metrics
            .export_to_file(&path)
            .await
            .with_context(|| format!("Failed to export metrics to {}", path))?;
        info!(target: "relay", "Metrics exported to {}", path);
    }
    Ok(())
}
