//! Ape staking compound bot
//!
//! Once a day (configured UTC hour) scans every staked BAYC/MAYC/BAKC position
//! held through the lending pool, claims pending ApeCoin for the ones worth
//! harvesting and compounds it, then does the same for P2P matched orders.
//!
//! Modes:
//!   (default)   scheduled loop until SIGINT/SIGTERM
//!   --once      one run now, ignoring the schedule window
//!   --estimate  plan every batch and report projected gas, submit nothing
//!
//! Created: 2026-10-10

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use ape_compound_bot::alert::{AlertSink, Notifier, PagerDutyAlerter, SlackAlerter};
use ape_compound_bot::chain::rpc::RpcChain;
use ape_compound_bot::config::{load_config_from_file, BotConfig, Network};
use ape_compound_bot::runtime::{Pipeline, RunLoop, Schedule};
use clap::Parser;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Ape staking reward harvester
#[derive(Parser)]
#[command(name = "ape-compound-bot")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "BOT_CONFIG", default_value = "config/bot.toml")]
    config: PathBuf,

    /// Network override (mainnet, fork_mainnet, goerli, sepolia)
    #[arg(short, long, env = "NETWORK")]
    network: Option<String>,

    /// Run the pipeline once and exit
    #[arg(long)]
    once: bool,

    /// Estimate gas for every batch without submitting
    #[arg(long, conflicts_with = "once")]
    estimate: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn build_notifier(config: &BotConfig) -> Notifier {
    let mut sinks: Vec<Arc<dyn AlertSink>> = Vec::new();
    if let Some(webhook) = &config.secrets.slack_webhook {
        sinks.push(Arc::new(SlackAlerter::new(webhook.clone(), config.alerts.app_name.clone())));
    }
    if let Some(key) = &config.secrets.pagerduty_routing_key {
        sinks.push(Arc::new(PagerDutyAlerter::new(key.clone(), config.network.to_string())));
    }
    if sinks.is_empty() {
        info!("No alert webhooks configured, alerts go to the log only");
    }
    Notifier::new(sinks)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let network = args
        .network
        .as_deref()
        .map(str::parse::<Network>)
        .transpose()?;
    let config = Arc::new(
        load_config_from_file(&args.config, network).context("Failed to load configuration")?,
    );

    info!("===========================================");
    info!("   Ape Compound Bot - {}", config.network);
    info!("===========================================");
    info!("Config file: {}", args.config.display());
    info!("Lending pool: {}", config.contracts.pool);
    for (collection, cfg) in config.tracked_collections() {
        info!("  - {} ntoken {} (batch limit {})", collection, cfg.ntoken, config.batch_limit(collection));
    }

    let signer: PrivateKeySigner = config
        .secrets
        .private_key
        .trim_start_matches("0x")
        .parse()
        .context("Invalid PRIVATE_KEY")?;
    let account = signer.address();
    info!("Signer: {}", account);

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(config.secrets.rpc_url.parse().context("Invalid RPC URL")?);
    let chain = Arc::new(RpcChain::new(provider, account, &config.contracts));

    let notifier = build_notifier(&config);
    let pipeline = Arc::new(Pipeline::new(config.clone(), chain.clone(), chain.clone(), notifier.clone()));

    if args.estimate {
        let report = pipeline.estimate().await?;
        info!(
            "{} batches, {} would fail, {} gas total",
            report.batches, report.failed, report.total_gas
        );
        return Ok(());
    }

    let mut run_loop = RunLoop::new(
        pipeline,
        chain,
        account,
        notifier,
        Schedule::from_config(&config),
        config.network,
    );

    if args.once {
        if !run_loop.run_once().await {
            anyhow::bail!("Run failed");
        }
        return Ok(());
    }

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let shutdown = async move {
        if let Some(sig) = signals.next().await {
            info!("Received signal {}, shutting down after current tick", sig);
        }
    };
    run_loop.run(shutdown).await;

    info!("Stopped");
    Ok(())
}
