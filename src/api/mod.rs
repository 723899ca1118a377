pub mod error;
pub mod models;
pub mod rest;

#[cfg(test)]
pub(crate) mod fake;

pub use error::ServiceError;
pub use models::{
    BacktestResult, BacktestSummary, BacktestTrade, DashboardStats, GlobalSettings,
    NewWatchlistEntry, PricePoint, Trade, TradeId, TradeSide, TradeStatus, WatchlistEntry,
};
pub use rest::RestClient;

use async_trait::async_trait;

/// The trading backend as seen by the dashboard: request/response only.
#[async_trait]
pub trait TradingBackend: Send + Sync {
    async fn fetch_active_trades(&self) -> Result<Vec<Trade>, ServiceError>;

    async fn fetch_history(&self) -> Result<Vec<Trade>, ServiceError>;

    async fn fetch_stats(&self) -> Result<DashboardStats, ServiceError>;

    async fn fetch_watchlist(&self) -> Result<Vec<WatchlistEntry>, ServiceError>;

    /// `entry.ticker` must already be upper-cased
    async fn add_watchlist_entry(
        &self,
        entry: &NewWatchlistEntry,
    ) -> Result<WatchlistEntry, ServiceError>;

    async fn remove_watchlist_entry(&self, ticker: &str) -> Result<(), ServiceError>;

    async fn fetch_global_settings(&self) -> Result<GlobalSettings, ServiceError>;

    async fn update_global_settings(&self, settings: &GlobalSettings) -> Result<(), ServiceError>;

    async fn run_backtest(&self, ticker: &str) -> Result<BacktestResult, ServiceError>;
}
