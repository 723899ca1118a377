//! Backtest CLI
//!
//! Asks the backend to backtest one ticker and prints the result.
//! Usage:
//!   cargo run --bin backtest -- run AAPL --trades --timeline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dashboard::api::models::ExitReason;
use dashboard::api::{RestClient, TradingBackend};
use dashboard::backtest::{BacktestSession, BacktestView, PointKind};
use dashboard::config::Config;
use dashboard::ui::{format_money, format_percent, BacktestSummaryView};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Run a backend backtest and review its timeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Backtest a single ticker
    Run {
        /// Ticker to backtest (e.g., AAPL)
        ticker: String,

        /// Show individual trades
        #[arg(long)]
        trades: bool,

        /// Show the merged price/trade timeline
        #[arg(long)]
        timeline: bool,
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
        Commands::Run {
            ticker,
            trades,
            timeline,
        } => {
            let session = BacktestSession::new(backend);
            let view = session.run(&ticker).await?;
            print_summary(&view);
            if trades {
                print_trades(&view);
            }
            if timeline {
                print_timeline(&view);
            }
        }
    }

    Ok(())
}

fn print_summary(view: &BacktestView) {
    println!("\n=== Backtest: {} ===", view.result.ticker);
    print!("{}", BacktestSummaryView::derive(&view.result.summary));
    if let Some((low, high)) = view.timeline.price_range() {
        println!(
            "Price range:     {} - {} over {} points",
            format_money(low),
            format_money(high),
            view.timeline.price_points().count()
        );
    }
}

fn print_trades(view: &BacktestView) {
    println!("\n=== Trades ===");
    for (i, trade) in view.result.trades.iter().enumerate() {
        let exit = match trade.exit() {
            Some((at, price)) => {
                format!("{} @ {}", at.format("%Y-%m-%d %H:%M"), format_money(price))
            }
            None => "open".to_string(),
        };
        let reason = match trade.exit_reason {
            Some(ExitReason::EndOfDay) => "EOD",
            Some(ExitReason::Signal) => "SIGNAL",
            Some(ExitReason::Other) => "other",
            None => "-",
        };
        println!(
            "{:>3}. {} @ {} -> {}  {} {} [{}]",
            i + 1,
            trade.entry_time.format("%Y-%m-%d %H:%M"),
            format_money(trade.entry_price),
            exit,
            trade.pnl.map(format_money).unwrap_or_else(|| "-".into()),
            trade.pnl_percent.map(format_percent).unwrap_or_default(),
            reason
        );
    }
}

fn print_timeline(view: &BacktestView) {
    println!("\n=== Timeline ===");
    for point in view.timeline.points() {
        let note = match (point.kind, point.trade_index, point.pnl_percent) {
            (PointKind::Price, _, _) => String::new(),
            (_, Some(index), Some(pnl)) => format!("  #{} {}", index + 1, format_percent(pnl)),
            (_, Some(index), None) => format!("  #{}", index + 1),
            (_, None, _) => String::new(),
        };
        println!(
            "{}  {:<5} {:>12}{}",
            point.timestamp.format("%Y-%m-%d %H:%M:%S"),
            point.kind.label(),
            format_money(point.price),
            note
        );
    }
}
