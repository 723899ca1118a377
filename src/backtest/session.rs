use super::timeline::Timeline;
use crate::api::models::normalize_ticker;
use crate::api::{BacktestResult, TradingBackend};
use crate::error::{DashboardError, Operation, ValidationError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A received backtest and its assembled timeline
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestView {
    pub result: BacktestResult,
    pub timeline: Timeline,
}

/// Holds at most one displayed backtest. Only the latest request may
/// populate it.
pub struct BacktestSession {
    backend: Arc<dyn TradingBackend>,
    generation: AtomicU64,
    current: RwLock<Option<Arc<BacktestView>>>,
}

impl BacktestSession {
    pub fn new(backend: Arc<dyn TradingBackend>) -> Self {
        Self {
            backend,
            generation: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> Option<Arc<BacktestView>> {
        self.current.read().await.clone()
    }

    /// Drop the displayed result and invalidate any request in flight
    pub async fn clear(&self) {
        let mut current = self.current.write().await;
        *current = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn run(&self, ticker: &str) -> Result<Arc<BacktestView>, DashboardError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(ValidationError::EmptyTicker.into());
        }

        let generation = {
            let mut current = self.current.write().await;
            *current = None;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        debug!("Running backtest for {} (request {})", ticker, generation);

        let outcome = self.backend.run_backtest(&ticker).await;

        let mut current = self.current.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding superseded backtest for {}", ticker);
            return Err(DashboardError::Superseded);
        }

        match outcome {
            Ok(result) => {
                let timeline = Timeline::assemble(&result.prices, &result.trades);
                info!(
                    "Backtest for {}: {} trades, {} timeline points",
                    ticker,
                    result.trades.len(),
                    timeline.len()
                );
                let view = Arc::new(BacktestView { result, timeline });
                *current = Some(Arc::clone(&view));
                Ok(view)
            }
            Err(err) => {
                warn!("Backtest for {} failed: {}", ticker, err);
                Err(DashboardError::classify(Operation::Query, err))
            }
        }
    }
}
