//! Live dashboard feeds: active trades, trade history and stats, each on its
//! own poller. Categories are independent; no ordering between them.

use super::diff::TradeDiff;
use super::scheduler::{Clock, Feed, PollCategory, PollEvent, Poller, SystemClock};
use crate::api::{DashboardStats, Trade, TradingBackend};
use crate::config::PollingConfig;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Point-in-time copy of every feed
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub active: Feed<Vec<Trade>>,
    pub history: Feed<Vec<Trade>>,
    pub stats: Feed<DashboardStats>,
    pub taken_at: DateTime<Utc>,
    pub freshness: Freshness,
}

/// Which feeds are older than their staleness limit at snapshot time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Freshness {
    pub active_stale: bool,
    pub history_stale: bool,
    pub stats_stale: bool,
}

impl Freshness {
    pub fn is_stale(&self, category: PollCategory) -> bool {
        match category {
            PollCategory::ActiveTrades => self.active_stale,
            PollCategory::History => self.history_stale,
            PollCategory::Stats => self.stats_stale,
        }
    }
}

pub struct DashboardSync {
    active: Poller<Vec<Trade>>,
    history: Poller<Vec<Trade>>,
    stats: Poller<DashboardStats>,
    clock: Arc<dyn Clock>,
    stale_after_intervals: u32,
    events: Option<mpsc::Receiver<PollEvent>>,
}

impl DashboardSync {
    pub fn new(backend: Arc<dyn TradingBackend>, config: &PollingConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn TradingBackend>,
        config: &PollingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.event_buffer.max(1));

        let source = Arc::clone(&backend);
        let active = Poller::builder(
            PollCategory::ActiveTrades,
            config.active_trades_interval(),
            move || {
                let backend = Arc::clone(&source);
                async move { backend.fetch_active_trades().await }.boxed()
            },
        )
        .clock(Arc::clone(&clock))
        .events(tx.clone())
        .on_change(report_transitions)
        .build();

        let source = Arc::clone(&backend);
        let history = Poller::builder(PollCategory::History, config.history_interval(), move || {
            let backend = Arc::clone(&source);
            async move { backend.fetch_history().await }.boxed()
        })
        .clock(Arc::clone(&clock))
        .events(tx.clone())
        .build();

        let source = backend;
        let stats = Poller::builder(PollCategory::Stats, config.stats_interval(), move || {
            let backend = Arc::clone(&source);
            async move { backend.fetch_stats().await }.boxed()
        })
        .clock(Arc::clone(&clock))
        .events(tx)
        .build();

        Self {
            active,
            history,
            stats,
            clock,
            stale_after_intervals: config.stale_after_intervals.max(1),
            events: Some(rx),
        }
    }

    pub fn start(&mut self) {
        self.active.start();
        self.history.start();
        self.stats.start();
    }

    /// Tear down all feeds; late responses are dropped
    pub fn stop(&mut self) {
        self.active.stop();
        self.history.stop();
        self.stats.stop();
    }

    pub fn is_running(&self) -> bool {
        self.active.is_running() || self.history.is_running() || self.stats.is_running()
    }

    /// Refresh one category now unless a refresh for it is already pending
    pub fn refresh_now(&self, category: PollCategory) -> bool {
        match category {
            PollCategory::ActiveTrades => self.active.refresh_now(),
            PollCategory::History => self.history.refresh_now(),
            PollCategory::Stats => self.stats.refresh_now(),
        }
    }

    /// Receiver of poll events. Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PollEvent>> {
        self.events.take()
    }

    pub fn max_age(&self, category: PollCategory) -> Duration {
        let interval = match category {
            PollCategory::ActiveTrades => self.active.interval(),
            PollCategory::History => self.history.interval(),
            PollCategory::Stats => self.stats.interval(),
        };
        interval * self.stale_after_intervals
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let active = self.active.feed().await;
        let history = self.history.feed().await;
        let stats = self.stats.feed().await;
        let now = self.clock.now();

        let freshness = Freshness {
            active_stale: active.is_stale(now, self.max_age(PollCategory::ActiveTrades)),
            history_stale: history.is_stale(now, self.max_age(PollCategory::History)),
            stats_stale: stats.is_stale(now, self.max_age(PollCategory::Stats)),
        };

        DashboardSnapshot {
            active,
            history,
            stats,
            taken_at: now,
            freshness,
        }
    }
}

/// Trades cannot be mutated from here; a close shows up as an id leaving the active set
fn report_transitions(previous: Option<&Vec<Trade>>, current: &Vec<Trade>) -> Vec<PollEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let diff = TradeDiff::between(previous, current);
    if diff.is_empty() {
        return Vec::new();
    }

    let mut events = Vec::new();
    if !diff.opened.is_empty() {
        info!("Observed {} newly opened trade(s): {:?}", diff.opened.len(), diff.opened);
        events.push(PollEvent::TradesOpened(diff.opened));
    }
    if !diff.closed.is_empty() {
        info!("Observed {} closed trade(s): {:?}", diff.closed.len(), diff.closed);
        events.push(PollEvent::TradesClosed(diff.closed));
    }
    events
}
