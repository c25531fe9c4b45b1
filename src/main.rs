//! TradeSim
//!
//! Connects to an L2 order book stream and prints a transaction cost
//! estimate for every snapshot.
//!
//! Usage:
//!   tradesim --config tradesim.toml --trade-size-usd 250
//!
//! Environment:
//!   TRADESIM_CONFIG - TOML config file (optional)
//!   TRADESIM_ENDPOINT - WebSocket endpoint
//!   TRADESIM_* - any other config field, upper-cased (see config.rs)
//!   TRADESIM_LOG_FILE - also append logs to this file (optional)
//!   RUST_LOG - log filter (default: tradesim=info,tradesim_backend=info)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tradesim_backend::feed::{ConnectionState, StreamConnectionManager, WsConnector};
use tradesim_backend::{FeedEvent, SimulatorConfig};

#[derive(Parser, Debug)]
#[command(name = "tradesim")]
#[command(about = "Order book transaction cost simulator")]
struct Args {
    /// TOML config file
    #[arg(long, env = "TRADESIM_CONFIG")]
    config: Option<PathBuf>,

    /// Order book WebSocket endpoint
    #[arg(long, env = "TRADESIM_ENDPOINT")]
    endpoint: Option<String>,

    /// Nominal trade size in USD
    #[arg(long, env = "TRADESIM_TRADE_SIZE_USD")]
    trade_size_usd: Option<f64>,

    /// Fee tier as a fraction of notional
    #[arg(long, env = "TRADESIM_FEE_TIER")]
    fee_tier: Option<f64>,

    /// Volatility used by the slippage fallback
    #[arg(long, env = "TRADESIM_VOLATILITY")]
    volatility: Option<f64>,

    /// Connection attempts before giving up
    #[arg(long, env = "TRADESIM_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Log a performance summary every N estimates
    #[arg(long, env = "TRADESIM_SUMMARY_EVERY")]
    summary_every: Option<u64>,

    /// Print every event as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Also append logs to this file, e.g. trade_simulator.log
    #[arg(long, env = "TRADESIM_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut SimulatorConfig) {
        if let Some(v) = &self.endpoint {
            config.endpoint = v.clone();
        }
        if let Some(v) = self.trade_size_usd {
            config.trade_size_usd = v;
        }
        if let Some(v) = self.fee_tier {
            config.fee_tier = v;
        }
        if let Some(v) = self.volatility {
            config.volatility = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.summary_every {
            config.summary_every = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let args = Args::parse();

    // Held until exit so buffered file output is flushed
    let _log_guard = init_tracing(args.log_file.as_deref())?;

    let mut config = match &args.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };
    config.apply_env();
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    info!("Starting TradeSim");
    info!("  Endpoint: {}", config.endpoint);
    info!("  Trade size: ${:.2}", config.trade_size_usd);
    info!("  Fee tier: {}", config.fee_tier);
    info!("  Volatility: {:.2}%", config.volatility * 100.0);

    let (tx, rx) = mpsc::unbounded_channel();
    let presenter = tokio::spawn(present(rx, args.json));

    let mut manager = StreamConnectionManager::new(&config, WsConnector, tx);

    let stop = manager.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            stop.stop();
        }
    });

    let final_state = manager.run().await;
    let metrics = manager.session().metrics();
    let stats = manager.tracker().stats();
    // Dropping the manager closes the event channel and ends the presenter
    drop(manager);
    let _ = presenter.await;

    info!(
        messages = metrics.messages_processed,
        estimates = stats.count,
        avg_ms = stats.mean_ms,
        "session summary: {}",
        metrics.summary()
    );

    if final_state == ConnectionState::GivenUp {
        bail!("feed gave up after {} connection attempts", config.max_retries);
    }
    Ok(())
}

/// Console stand-in for the UI: one line per event.
async fn present(mut rx: mpsc::UnboundedReceiver<FeedEvent>, json: bool) {
    while let Some(event) = rx.recv().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "failed to serialize event"),
            }
            continue;
        }

        match event {
            FeedEvent::Status { status } => info!(status = %status, "feed status"),
            FeedEvent::Error { error } => warn!(error = %error, "feed error"),
            FeedEvent::Estimate(record) => info!(
                "[{}] net={} slippage={} fees={} impact={} maker/taker={}/{} latency={} (avg {})",
                record.timestamp,
                record.net_cost,
                record.slippage,
                record.fees,
                record.impact,
                record.maker_proportion,
                record.taker_proportion,
                record.processing_latency,
                record.avg_latency
            ),
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("log file {} has no file name", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradesim=info,tradesim_backend=info".into()),
        )
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        info!(path = %path.display(), "logging to file");
    }
    Ok(guard)
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
