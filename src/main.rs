//! Incremental SOL → USDC sell agent.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the chain/aggregator/notifier clients, and runs the sell loop
//! until the process is interrupted.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

use incremental_sell::aggregator::jupiter::JupiterClient;
use incremental_sell::chain::rpc::SolanaRpc;
use incremental_sell::config::AppConfig;
use incremental_sell::engine::{Collaborators, SellScheduler};
use incremental_sell::journal::TradeJournal;
use incremental_sell::notify::{DiscordNotifier, Notifier, NullNotifier};
use incremental_sell::wallet::WalletIdentity;

const BANNER: &str = r#"
  _____ ____  _       ____  _____ _     _
 / ____/ __ \| |     / ___|| ____| |   | |
| (___| |  | | |     \___ \|  _| | |   | |
 \___ \ |  | | |      ___) | |___| |___| |___
 ____) | |__| | |___ |____/|_____|_____|_____|
|_____/ \____/|_____|

  Incremental SOL → USDC seller
  v0.1.0
"#;

/// Config path, overridable with `SELL_CONFIG`.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Configuration: TOML file (optional) → environment overrides → validation
    let config_path =
        std::env::var("SELL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load_or_default(&config_path)?.with_env_overrides()?;
    cfg.validate().context("Invalid configuration")?;

    init_logging();

    println!("{BANNER}");

    // -- Initialise components -------------------------------------------

    let wallet = WalletIdentity::from_file(&cfg.wallet.path)?;
    let identity = wallet.pubkey().to_string();

    info!(
        wallet = %identity,
        rpc_url = %cfg.network.rpc_url,
        aggregator = %cfg.jupiter.base_url,
        config = %config_path,
        "Agent starting up"
    );

    let chain = Arc::new(SolanaRpc::new(&cfg.network));
    let jupiter = Arc::new(JupiterClient::new(cfg.jupiter.clone())?);

    let notifier: Arc<dyn Notifier> =
        match DiscordNotifier::from_env(&cfg.alerts.discord_webhook_env)? {
            Some(discord) => Arc::new(discord),
            None => {
                info!(
                    env = %cfg.alerts.discord_webhook_env,
                    "No webhook configured — alerts disabled"
                );
                Arc::new(NullNotifier)
            }
        };
    info!(sink = notifier.name(), "Notifier ready");

    let journal = TradeJournal::open(&cfg.logging.dir, &identity, notifier)?;
    info!(path = %journal.path().display(), "Trade journal open");

    let collaborators = Collaborators {
        chain,
        quotes: jupiter.clone(),
        swaps: jupiter,
    };

    let mut scheduler = SellScheduler::new(
        &cfg,
        wallet,
        collaborators,
        journal,
        StdRng::from_entropy(),
    );

    // -- Main loop -------------------------------------------------------

    info!("Entering sell loop. Press Ctrl+C to stop.");

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    let stats = scheduler.stats();
    info!(
        iterations = stats.iterations,
        sold = stats.sold,
        unconfirmed = stats.unconfirmed,
        skipped = stats.skipped,
        failed = stats.failed,
        phase = %scheduler.phase(),
        "Agent stopped."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("incremental_sell=info"));

    let json_logging = std::env::var("SELL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
