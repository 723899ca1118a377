//! In-memory backend for tests. Mirrors the real backend's rules: unique
//! tickers, 404 on unknown removals, server-assigned ids, and no stored
//! concurrency limit on creation.

use crate::api::error::ServiceError;
use crate::api::models::{
    BacktestResult, DashboardStats, GlobalSettings, NewWatchlistEntry, Trade, WatchlistEntry,
};
use crate::api::TradingBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub active: Vec<Trade>,
    pub history: Vec<Trade>,
    pub stats: Option<DashboardStats>,
    pub watchlist: Vec<WatchlistEntry>,
    pub settings: GlobalSettings,
    pub backtests: HashMap<String, BacktestResult>,
    next_id: i64,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub state: Mutex<FakeState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, ServiceError>>,
    gate: Option<Semaphore>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request waits for a permit from `release` before answering
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release(&self, requests: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(requests);
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn fail(&self, op: &'static str, err: ServiceError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn heal(&self, op: &str) {
        self.failures.lock().unwrap().remove(op);
    }

    pub fn set_active(&self, trades: Vec<Trade>) {
        self.state.lock().unwrap().active = trades;
    }

    pub fn set_stats(&self, stats: DashboardStats) {
        self.state.lock().unwrap().stats = Some(stats);
    }

    pub fn add_backtest(&self, result: BacktestResult) {
        self.state
            .lock()
            .unwrap()
            .backtests
            .insert(result.ticker.clone(), result);
    }

    pub fn seed_watchlist(&self, tickers: &[&str]) {
        let mut state = self.state.lock().unwrap();
        for ticker in tickers {
            state.next_id += 1;
            let id = state.next_id;
            state.watchlist.push(WatchlistEntry {
                id: Some(id),
                ticker: ticker.to_string(),
                company_name: None,
                is_active: true,
                max_concurrent_trades: None,
            });
        }
    }

    async fn enter(&self, op: &'static str) -> Result<(), ServiceError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        match self.failures.lock().unwrap().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn not_found(message: &str) -> ServiceError {
    ServiceError::Service {
        status: 404,
        message: message.to_string(),
    }
}

#[async_trait]
impl TradingBackend for FakeBackend {
    async fn fetch_active_trades(&self) -> Result<Vec<Trade>, ServiceError> {
        self.enter("fetch_active_trades").await?;
        Ok(self.state.lock().unwrap().active.clone())
    }

    async fn fetch_history(&self) -> Result<Vec<Trade>, ServiceError> {
        self.enter("fetch_history").await?;
        Ok(self.state.lock().unwrap().history.clone())
    }

    async fn fetch_stats(&self) -> Result<DashboardStats, ServiceError> {
        self.enter("fetch_stats").await?;
        self.state
            .lock()
            .unwrap()
            .stats
            .clone()
            .ok_or_else(|| ServiceError::Decode("no stats".into()))
    }

    async fn fetch_watchlist(&self) -> Result<Vec<WatchlistEntry>, ServiceError> {
        self.enter("fetch_watchlist").await?;
        Ok(self.state.lock().unwrap().watchlist.clone())
    }

    async fn add_watchlist_entry(
        &self,
        entry: &NewWatchlistEntry,
    ) -> Result<WatchlistEntry, ServiceError> {
        self.enter("add_watchlist_entry").await?;
        let mut state = self.state.lock().unwrap();
        if state.watchlist.iter().any(|e| e.ticker == entry.ticker) {
            return Err(ServiceError::Service {
                status: 400,
                message: "Ticker already in watchlist".into(),
            });
        }
        state.next_id += 1;
        let created = WatchlistEntry {
            id: Some(state.next_id),
            ticker: entry.ticker.clone(),
            company_name: entry.company_name.clone(),
            is_active: entry.is_active,
            max_concurrent_trades: None,
        };
        state.watchlist.push(created.clone());
        Ok(created)
    }

    async fn remove_watchlist_entry(&self, ticker: &str) -> Result<(), ServiceError> {
        self.enter("remove_watchlist_entry").await?;
        let mut state = self.state.lock().unwrap();
        let before = state.watchlist.len();
        state.watchlist.retain(|e| e.ticker != ticker);
        if state.watchlist.len() == before {
            return Err(not_found("Company not found"));
        }
        Ok(())
    }

    async fn fetch_global_settings(&self) -> Result<GlobalSettings, ServiceError> {
        self.enter("fetch_global_settings").await?;
        Ok(self.state.lock().unwrap().settings.clone())
    }

    async fn update_global_settings(&self, settings: &GlobalSettings) -> Result<(), ServiceError> {
        self.enter("update_global_settings").await?;
        self.state.lock().unwrap().settings = settings.clone();
        Ok(())
    }

    async fn run_backtest(&self, ticker: &str) -> Result<BacktestResult, ServiceError> {
        self.enter("run_backtest").await?;
        self.state
            .lock()
            .unwrap()
            .backtests
            .get(ticker)
            .cloned()
            .ok_or_else(|| ServiceError::Service {
                status: 400,
                message: "Insufficient data: 0 candles found.".into(),
            })
    }
}
