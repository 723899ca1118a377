use anyhow::{Context, Result};
use dashboard::api::{RestClient, TradingBackend};
use dashboard::config::Config;
use dashboard::sync::{DashboardSync, PollEvent};
use dashboard::ui::DashboardViewModel;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the rendered dashboard owns stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Skyrocket dashboard");

    let config = Config::load()?;
    let client = RestClient::from_config(&config.backend)
        .context("Failed to create backend client")?;
    let backend: Arc<dyn TradingBackend> = Arc::new(client);
    tracing::info!(
        "Polling {} every {}s/{}s/{}s (active/history/stats)",
        config.backend.base_url,
        config.polling.active_trades_secs,
        config.polling.history_secs,
        config.polling.stats_secs
    );

    let mut sync = DashboardSync::new(backend, &config.polling);
    let mut events = sync
        .take_events()
        .context("Dashboard event stream already taken")?;
    sync.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match &event {
                    PollEvent::TradesClosed(ids) => println!(">> Closed trades: {:?}", ids),
                    PollEvent::TradesOpened(ids) => println!(">> Opened trades: {:?}", ids),
                    PollEvent::Refreshed(_) | PollEvent::Failed { .. } => {}
                }
                let view = DashboardViewModel::derive(&sync.snapshot().await);
                println!("{}", view);
            }
        }
    }

    sync.stop();
    Ok(())
}
