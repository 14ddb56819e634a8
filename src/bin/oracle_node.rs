//! Staked price oracle node
//!
//! Proves registration on the NodeManager contract (registering with the
//! minimum stake if needed), then signs and streams a BTCUSD attestation to
//! the sink every interval.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rust_oracle_node::client::{EthLedgerClient, HttpQuoteFetcher, RpcClient, WsPublishChannel};
use rust_oracle_node::config::{OracleConfig, UnknownRegistrationPolicy};
use rust_oracle_node::crypto::KeySigner;
use rust_oracle_node::error::{ConfigError, NodeError};
use rust_oracle_node::{NodeSettings, OracleNode};

/// Oracle node command-line arguments
#[derive(Parser, Debug)]
#[command(name = "oracle_node", version)]
struct Args {
    /// TOML config file (missing file means defaults)
    #[arg(long, default_value = "oracle.toml")]
    config: PathBuf,

    /// Dotenv file with PRIVATE_KEY, RPC_URL, NODE_MANAGER_CONTRACT, ...
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// JSON-RPC endpoint of the chain node
    #[arg(long)]
    rpc_url: Option<String>,

    /// NodeManager contract address
    #[arg(long)]
    contract: Option<String>,

    /// WebSocket sink for attestations
    #[arg(long)]
    publish_url: Option<String>,

    /// Seconds between ticks
    #[arg(long)]
    interval: Option<u64>,

    /// Asset to price, e.g. BTC
    #[arg(long)]
    base: Option<String>,

    /// Quote currency, e.g. USD
    #[arg(long)]
    currency: Option<String>,

    /// What to do if the registration check itself fails
    #[arg(long, value_enum)]
    on_unknown_registration: Option<UnknownRegistrationPolicy>,
}

fn load_config(args: &Args) -> Result<OracleConfig, ConfigError> {
    let mut config = OracleConfig::load_or_default(&args.config)?;
    config.apply_env(|k| std::env::var(k).ok())?;

    if let Some(url) = &args.rpc_url {
        config.ledger.rpc_url = url.clone();
    }
    if let Some(addr) = &args.contract {
        config.ledger.contract_address = Some(addr.clone());
    }
    if let Some(url) = &args.publish_url {
        config.publish.url = url.clone();
    }
    if let Some(secs) = args.interval {
        config.node.interval_secs = secs;
    }
    if let Some(base) = &args.base {
        config.quote.base = base.clone();
    }
    if let Some(currency) = &args.currency {
        config.quote.currency = currency.clone();
    }
    if let Some(policy) = args.on_unknown_registration {
        config.node.on_unknown_registration = policy;
    }
    Ok(config)
}

type Node = OracleNode<EthLedgerClient, HttpQuoteFetcher, WsPublishChannel>;

fn build_node(config: &OracleConfig) -> Result<Node, NodeError> {
    // Key first: nothing touches the network without it
    let signer = Arc::new(KeySigner::from_optional_hex(
        config.private_key.as_ref().map(|k| k.expose()),
    )?);
    config.validate()?;

    info!("🔮 Oracle Node v{} Starting...", env!("CARGO_PKG_VERSION"));
    info!("RPC URL: {}", config.ledger.rpc_url);
    info!("Sink: {}", config.publish.url);
    info!("Symbol: {} every {}s", config.symbol(), config.node.interval_secs);

    let rpc = RpcClient::new(
        config.ledger.rpc_url.clone(),
        Duration::from_secs(config.ledger.request_timeout_secs),
    )
    .map_err(|e| ConfigError::Invalid {
        field: "ledger",
        reason: e.to_string(),
    })?;
    let ledger = EthLedgerClient::new(
        rpc,
        config.contract_address()?,
        config.ledger.gas_params(),
        Duration::from_secs(config.ledger.confirmation_timeout_secs),
        Duration::from_millis(config.ledger.receipt_poll_interval_ms),
    );
    let fetcher = HttpQuoteFetcher::new(
        config.quote.source(),
        Duration::from_secs(config.quote.timeout_secs),
    )
    .map_err(|e| ConfigError::Invalid {
        field: "quote",
        reason: e.to_string(),
    })?;
    let channel = WsPublishChannel::new(config.publish.url.clone())
        .with_connect_timeout(Duration::from_secs(config.publish.connect_timeout_secs));

    let settings = NodeSettings {
        interval: config.interval(),
        on_unknown_registration: config.node.on_unknown_registration,
    };
    Ok(OracleNode::new(signer, ledger, fetcher, channel, settings))
}

async fn run(config: OracleConfig) -> Result<(), NodeError> {
    let mut node = match build_node(&config) {
        Ok(node) => node,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e);
        }
    };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down...");
            shutdown.cancel();
        }
    });

    node.run(cancel).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = dotenvy::from_path(&args.env_file) {
        // A missing .env is fine
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("⚠️  Warning: Failed to load {}: {}", args.env_file.display(), e);
        }
    }

    let config = load_config(&args);
    let log_level = config
        .as_ref()
        .map(|c| c.node.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", NodeError::from(e));
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
