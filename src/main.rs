//! Breakout Scalper
//!
//! Single-symbol intraday engine: scores breakouts on a short candle window, sizes with a
//! stepped equity progression behind a daily drawdown breaker, and manages one position
//! at a time with ATR targets and a trailing stop.

mod api;
mod db;
mod engine;
mod indicators;
mod metrics;
mod models;
mod trading;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{BinanceFeed, BingxClient, PaperExchange};
use crate::db::{InMemoryTradeLog, JsonTradeLog, SqliteTradeLog, TradeLogStore};
use crate::engine::{Engine, EngineConfig};
use crate::metrics::MemoryStats;
use crate::trading::oracle_for;

/// Breakout scalper CLI.
#[derive(Parser)]
#[command(name = "scalper")]
#[command(about = "ATR breakout scalper for perpetual swaps", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// JSON configuration file overlaid on the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against BingX quotes and Binance candles
    Run {
        /// Symbol override, e.g. BTC-USDT
        #[arg(short, long)]
        symbol: Option<String>,

        /// Tick interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// SQLite URL; stores P&L history and the trade journal there instead of JSON
        #[arg(long)]
        journal: Option<String>,

        /// BingX API key
        #[arg(long, env = "BINGX_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Paper trade on live quotes with a simulated account
    Paper {
        /// Starting balance of the simulated account
        #[arg(short, long, default_value = "1000")]
        capital: f64,

        /// Symbol override, e.g. BTC-USDT
        #[arg(short, long)]
        symbol: Option<String>,

        /// Keep P&L history in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Show effective configuration
    Config,

    /// Show remembered trade results and the adjustment they produce
    Memory {
        /// Read from a SQLite journal instead of the JSON log
        #[arg(long)]
        journal: Option<String>,
    },

    /// Show the closed-trade journal
    Journal {
        /// SQLite URL
        #[arg(short, long, default_value = "sqlite:./scalper.db?mode=rwc")]
        database: String,

        /// Number of trades to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

async fn open_store(config: &EngineConfig, journal: Option<&str>) -> Result<Arc<dyn TradeLogStore>> {
    let capacity = config.strategy.memory_capacity;
    match journal {
        Some(url) => {
            let store = SqliteTradeLog::new(url, capacity)
                .await
                .context("Failed to open trade journal")?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(JsonTradeLog::new(&config.trade_log_path, capacity))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = EngineConfig::load(cli.config.as_deref()).context("Invalid configuration")?;

    match cli.command {
        Commands::Run {
            symbol,
            interval,
            journal,
            api_key,
        } => {
            if let Some(symbol) = symbol {
                config.symbol = symbol;
            }
            if let Some(interval) = interval {
                config.tick_interval_secs = interval;
            }
            config.validate().context("Invalid configuration")?;

            info!(symbol = %config.symbol, "Starting live engine");

            let exchange = Arc::new(BingxClient::new(api_key)?);
            let feed = Arc::new(BinanceFeed::new()?);
            let store = open_store(&config, journal.as_deref()).await?;

            let mut engine = Engine::new(config, exchange, feed, store).await?;
            engine.run().await?;
        }

        Commands::Paper {
            capital,
            symbol,
            ephemeral,
        } => {
            if let Some(symbol) = symbol {
                config.symbol = symbol;
            }
            config.validate().context("Invalid configuration")?;

            info!(symbol = %config.symbol, capital = capital, ephemeral = ephemeral, "Starting paper engine");

            let quotes = Arc::new(BingxClient::new(None)?);
            let exchange = Arc::new(PaperExchange::with_quotes(quotes, capital));
            let feed = Arc::new(BinanceFeed::new()?);
            let store: Arc<dyn TradeLogStore> = if ephemeral {
                Arc::new(InMemoryTradeLog::new(config.strategy.memory_capacity))
            } else {
                open_store(&config, None).await?
            };

            let mut engine = Engine::new(config, exchange.clone(), feed, store).await?;
            engine.run().await?;

            println!("\nFinal balance: {:.2} (started with {:.2})", exchange.balance().await, capital);
            println!("{}", MemoryStats::calculate(&engine.memory().values()));
        }

        Commands::Config => {
            config.validate().context("Invalid configuration")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Memory { journal } => {
            let store = open_store(&config, journal.as_deref()).await?;
            let pnls = store.load_recent(config.strategy.memory_capacity).await?;

            if pnls.is_empty() {
                println!("No trades remembered yet.");
                return Ok(());
            }

            let oracle = oracle_for(config.strategy.adjustment);
            println!("\nRecent P&Ls (oldest first):");
            for pnl in &pnls {
                println!("  {:>10.2}", pnl);
            }
            println!("\nAdjustment factor ({:?}): {:.2}", config.strategy.adjustment, oracle.factor(&pnls));
            println!("\n{}", MemoryStats::calculate(&pnls));
        }

        Commands::Journal { database, limit } => {
            let store = SqliteTradeLog::new(&database, config.strategy.memory_capacity).await?;
            let entries = store.journal(limit).await?;

            if entries.is_empty() {
                println!("Journal is empty.");
                return Ok(());
            }

            println!(
                "\n{:<26} {:<6} {:>8} {:>12} {:>12} {:>10} {:<6}",
                "EXIT TIME", "SIDE", "QTY", "ENTRY", "EXIT", "P&L", "REASON"
            );
            println!("{}", "-".repeat(88));
            for e in entries {
                println!(
                    "{:<26} {:<6} {:>8} {:>12.2} {:>12.2} {:>10.2} {:<6}",
                    truncate(&e.exit_time, 25),
                    e.side,
                    e.quantity,
                    e.entry_price,
                    e.exit_price,
                    e.pnl,
                    e.reason
                );
            }
        }
    }

    Ok(())
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
