//! Watchlist and global settings CLI
//!
//! Usage:
//!   cargo run --bin settings -- watchlist list
//!   cargo run --bin settings -- watchlist add NVDA --name "NVIDIA Corp." --max-trades 3
//!   cargo run --bin settings -- global set --stop-loss 5 --allocation 2

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dashboard::api::{GlobalSettings, NewWatchlistEntry, RestClient, TradingBackend};
use dashboard::config::Config;
use dashboard::settings::{GlobalSettingsManager, SettingsView, WatchlistManager};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "settings")]
#[command(about = "Manage the trading watchlist and global risk settings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tradable symbols
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },

    /// Risk parameters applied to every trade
    Global {
        #[command(subcommand)]
        action: GlobalAction,
    },
}

#[derive(Subcommand, Debug)]
enum WatchlistAction {
    /// Show the watchlist
    List,

    /// Add a symbol
    Add {
        ticker: String,

        /// Company name shown next to the ticker
        #[arg(short, long)]
        name: Option<String>,

        /// Maximum concurrent trades (1-10)
        #[arg(short, long)]
        max_trades: Option<u32>,
    },

    /// Remove a symbol
    Remove { ticker: String },
}

#[derive(Subcommand, Debug)]
enum GlobalAction {
    /// Show current settings
    Show,

    /// Change settings; omitted fields keep their current value
    Set {
        /// Global stop loss percent (1-50)
        #[arg(long)]
        stop_loss: Option<f64>,

        /// Take profit percent (1-200)
        #[arg(long)]
        take_profit: Option<f64>,

        /// Maximum allocation per trade in percent (0.1-100)
        #[arg(long)]
        allocation: Option<f64>,

        /// Enable or disable trading
        #[arg(long)]
        trading: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let client = RestClient::from_config(&config.backend)
        .context("Failed to create backend client")?;
    let backend: Arc<dyn TradingBackend> = Arc::new(client);

    match cli.command {
        Commands::Watchlist { action } => run_watchlist(backend, action).await,
        Commands::Global { action } => run_global(backend, action).await,
    }
}

async fn run_watchlist(backend: Arc<dyn TradingBackend>, action: WatchlistAction) -> Result<()> {
    let manager = WatchlistManager::new(backend);
    manager.refresh().await.context("Failed to load watchlist")?;

    match action {
        WatchlistAction::List => {}
        WatchlistAction::Add {
            ticker,
            name,
            max_trades,
        } => {
            let mut draft = NewWatchlistEntry::new(&ticker);
            if let Some(name) = name {
                draft = draft.with_company_name(&name);
            }
            if let Some(limit) = max_trades {
                draft = draft.with_concurrency_limit(limit);
            }
            let created = manager.add(draft).await?;
            println!("Added {}", created.ticker);
        }
        WatchlistAction::Remove { ticker } => {
            manager.remove(&ticker).await?;
            println!("Removed {}", ticker.trim().to_uppercase());
        }
    }

    if manager.needs_resync().await {
        println!("(watchlist below may be out of date)");
    }

    let entries = manager.entries().await;
    println!("{:<4} {:<8} {:<30} {:<8} MAX TRADES", "ID", "TICKER", "COMPANY", "ACTIVE");
    for entry in &entries {
        println!(
            "{:<4} {:<8} {:<30} {:<8} {}",
            entry.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            entry.ticker,
            entry.company_name.as_deref().unwrap_or("-"),
            if entry.is_active { "yes" } else { "no" },
            entry
                .max_concurrent_trades
                .map(|n| n.to_string())
                .unwrap_or_else(|| "default".into()),
        );
    }
    println!("{} symbols", entries.len());
    Ok(())
}

async fn run_global(backend: Arc<dyn TradingBackend>, action: GlobalAction) -> Result<()> {
    let manager = GlobalSettingsManager::new(backend);
    let current = manager
        .refresh()
        .await
        .context("Failed to load global settings")?;

    if let GlobalAction::Set {
        stop_loss,
        take_profit,
        allocation,
        trading,
    } = action
    {
        let wanted = GlobalSettings {
            global_stop_loss_pct: stop_loss.unwrap_or(current.global_stop_loss_pct),
            take_profit_pct: take_profit.unwrap_or(current.take_profit_pct),
            max_trade_allocation_pct: allocation.unwrap_or(current.max_trade_allocation_pct),
            is_trading_enabled: trading.unwrap_or(current.is_trading_enabled),
        };
        manager.update(wanted).await?;
        println!("Settings updated");
    }

    if let Some(SettingsView { settings, .. }) = manager.display().await {
        println!("Stop loss:      {:.2}%", settings.global_stop_loss_pct);
        println!("Take profit:    {:.2}%", settings.take_profit_pct);
        println!("Max allocation: {:.2}%", settings.max_trade_allocation_pct);
        println!(
            "Trading:        {}",
            if settings.is_trading_enabled { "enabled" } else { "disabled" }
        );
    }
    if manager.needs_resync().await {
        println!("(settings above may be out of date)");
    }
    Ok(())
}
