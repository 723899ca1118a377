//! Watchlist CRUD with optimistic display and confirmation by full re-fetch

use super::mutation::{MutationState, MutationTracker};
use crate::api::models::normalize_ticker;
use crate::api::{NewWatchlistEntry, ServiceError, TradingBackend, WatchlistEntry};
use crate::error::{DashboardError, Operation, ValidationError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Adding,
    Removing,
}

/// A row of the optimistic watchlist view
#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistRow {
    pub entry: WatchlistEntry,
    pub pending: Option<PendingKind>,
}

#[derive(Debug, Clone)]
enum PendingChange {
    Add(WatchlistEntry),
    Remove,
}

#[derive(Debug, Default)]
struct WatchlistView {
    /// Exactly what the backend last returned
    confirmed: Vec<WatchlistEntry>,
    pending: BTreeMap<String, PendingChange>,
    mutations: MutationTracker<String>,
    needs_resync: bool,
}

pub struct WatchlistManager {
    backend: Arc<dyn TradingBackend>,
    view: RwLock<WatchlistView>,
}

impl WatchlistManager {
    pub fn new(backend: Arc<dyn TradingBackend>) -> Self {
        Self {
            backend,
            view: RwLock::new(WatchlistView::default()),
        }
    }

    /// Replace the confirmed view with the backend's watchlist
    pub async fn refresh(&self) -> Result<Vec<WatchlistEntry>, DashboardError> {
        match self.backend.fetch_watchlist().await {
            Ok(entries) => {
                let mut view = self.view.write().await;
                view.confirmed = entries.clone();
                view.needs_resync = false;
                Ok(entries)
            }
            Err(err) => {
                warn!("Failed to load watchlist: {}", err);
                Err(DashboardError::classify(Operation::Query, err))
            }
        }
    }

    /// Confirmed entries only
    pub async fn entries(&self) -> Vec<WatchlistEntry> {
        self.view.read().await.confirmed.clone()
    }

    /// Set when a mutation succeeded but the confirming re-fetch did not
    pub async fn needs_resync(&self) -> bool {
        self.view.read().await.needs_resync
    }

    pub async fn state(&self, ticker: &str) -> MutationState {
        self.view
            .read()
            .await
            .mutations
            .state(&normalize_ticker(ticker))
    }

    /// Confirmed rows with pending adds appended and pending removals flagged
    pub async fn display(&self) -> Vec<WatchlistRow> {
        let view = self.view.read().await;

        let mut rows: Vec<WatchlistRow> = view
            .confirmed
            .iter()
            .map(|entry| WatchlistRow {
                entry: entry.clone(),
                pending: match view.pending.get(&entry.ticker) {
                    Some(PendingChange::Remove) => Some(PendingKind::Removing),
                    _ => None,
                },
            })
            .collect();

        for change in view.pending.values() {
            if let PendingChange::Add(entry) = change {
                if !view.confirmed.iter().any(|e| e.ticker == entry.ticker) {
                    rows.push(WatchlistRow {
                        entry: entry.clone(),
                        pending: Some(PendingKind::Adding),
                    });
                }
            }
        }

        rows
    }

    /// Add a symbol. The returned entry is the backend's, which may differ
    /// from the request in server-assigned fields.
    pub async fn add(&self, draft: NewWatchlistEntry) -> Result<WatchlistEntry, DashboardError> {
        let entry = draft.normalized();
        entry.validate()?;
        let ticker = entry.ticker.clone();

        {
            let mut view = self.view.write().await;
            view.pending
                .insert(ticker.clone(), PendingChange::Add(entry.preview()));
            view.mutations.begin(ticker.clone());
        }

        match self.backend.add_watchlist_entry(&entry).await {
            Ok(created) => {
                info!("Added {} to watchlist", ticker);
                let confirmed = self.confirm(&ticker).await;
                Ok(confirmed
                    .and_then(|entries| entries.into_iter().find(|e| e.ticker == ticker))
                    .unwrap_or(created))
            }
            Err(err) => Err(self.roll_back(&ticker, Operation::Add, err).await),
        }
    }

    pub async fn remove(&self, ticker: &str) -> Result<(), DashboardError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(ValidationError::EmptyTicker.into());
        }

        {
            let mut view = self.view.write().await;
            view.pending.insert(ticker.clone(), PendingChange::Remove);
            view.mutations.begin(ticker.clone());
        }

        match self.backend.remove_watchlist_entry(&ticker).await {
            Ok(()) => {
                info!("Removed {} from watchlist", ticker);
                self.confirm(&ticker).await;
                Ok(())
            }
            Err(err) => Err(self.roll_back(&ticker, Operation::Remove, err).await),
        }
    }

    /// Settle a successful mutation by re-reading the backend's watchlist
    async fn confirm(&self, ticker: &str) -> Option<Vec<WatchlistEntry>> {
        let refreshed = self.backend.fetch_watchlist().await;

        let mut view = self.view.write().await;
        view.pending.remove(ticker);
        view.mutations.confirm(ticker.to_string());

        match refreshed {
            Ok(entries) => {
                view.confirmed = entries.clone();
                view.needs_resync = false;
                Some(entries)
            }
            Err(err) => {
                warn!(
                    "Watchlist change for {} was accepted but re-sync failed: {}",
                    ticker, err
                );
                view.needs_resync = true;
                None
            }
        }
    }

    async fn roll_back(&self, ticker: &str, op: Operation, err: ServiceError) -> DashboardError {
        let error = DashboardError::classify(op, err);
        if error.is_conflict() {
            info!("Watchlist change for {} conflicted: {}", ticker, error);
        } else {
            warn!("Watchlist change for {} failed: {}", ticker, error);
        }

        let mut view = self.view.write().await;
        view.pending.remove(ticker);
        view.mutations.roll_back(ticker.to_string(), error.to_string());
        error
    }
}
