//! Periodic refresh of one data category.
//!
//! A `Poller` fires its refresh immediately on `start()` and then on every
//! interval tick. Ticks that land while a refresh is still pending are
//! skipped. `stop()` cancels the timer and bumps the generation so responses
//! still on the wire are dropped when they arrive.

use crate::api::{ServiceError, TradeId};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Source of wall-clock time for feed bookkeeping
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let (Ok(mut now), Ok(by)) = (self.now.lock(), chrono::Duration::from_std(by)) {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollCategory {
    ActiveTrades,
    History,
    Stats,
}

impl PollCategory {
    pub const ALL: [PollCategory; 3] = [
        PollCategory::ActiveTrades,
        PollCategory::History,
        PollCategory::Stats,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PollCategory::ActiveTrades => "active trades",
            PollCategory::History => "trade history",
            PollCategory::Stats => "stats",
        }
    }
}

impl std::fmt::Display for PollCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Refreshed(PollCategory),
    Failed {
        category: PollCategory,
        error: ServiceError,
    },
    TradesOpened(Vec<TradeId>),
    TradesClosed(Vec<TradeId>),
}

/// Last-known-good data of one category plus refresh bookkeeping
#[derive(Debug, Clone)]
pub struct Feed<T> {
    pub data: Option<T>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    /// Set while the most recent refresh failed
    pub last_error: Option<ServiceError>,
    pub successes: u64,
    pub failures: u64,
}

impl<T> Default for Feed<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_success: None,
            last_failure: None,
            last_error: None,
            successes: 0,
            failures: 0,
        }
    }
}

impl<T> Feed<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn refresh_failed(&self) -> bool {
        self.last_error.is_some()
    }

    /// No success yet, or the last one is older than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_success {
            None => true,
            Some(at) => match (now - at).to_std() {
                Ok(age) => age > max_age,
                // clock stepped backwards
                Err(_) => false,
            },
        }
    }

    fn record_success(&mut self, value: T, at: DateTime<Utc>) {
        self.data = Some(value);
        self.last_success = Some(at);
        self.last_error = None;
        self.successes += 1;
    }

    fn record_failure(&mut self, err: ServiceError, at: DateTime<Utc>) {
        self.last_failure = Some(at);
        self.last_error = Some(err);
        self.failures += 1;
    }
}

pub type RefreshFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ServiceError>> + Send + Sync>;

/// Called with the previous and the new value on every successful refresh
pub type ChangeHook<T> = Box<dyn Fn(Option<&T>, &T) -> Vec<PollEvent> + Send + Sync>;

struct Shared<T> {
    category: PollCategory,
    refresh: RefreshFn<T>,
    feed: RwLock<Feed<T>>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    clock: Arc<dyn Clock>,
    events: Option<mpsc::Sender<PollEvent>>,
    on_change: Option<ChangeHook<T>>,
}

impl<T: Send + Sync + 'static> Shared<T> {
    fn trigger(self: &Arc<Self>) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("{} refresh still in flight, skipping", self.category);
            return false;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let request = (self.refresh)();
        let shared = Arc::clone(self);

        tokio::spawn(async move {
            let result = request.await;
            shared.complete(generation, result).await;
        });

        true
    }

    async fn complete(&self, generation: u64, result: Result<T, ServiceError>) {
        let mut events = Vec::new();
        {
            let mut feed = self.feed.write().await;

            // Checked under the feed lock: this is the point a response counts as applied
            if self.generation.load(Ordering::Acquire) != generation {
                debug!(
                    "Discarding {} response from stopped generation {}",
                    self.category, generation
                );
                return;
            }

            let now = self.clock.now();
            match result {
                Ok(value) => {
                    events.push(PollEvent::Refreshed(self.category));
                    if let Some(hook) = &self.on_change {
                        events.extend(hook(feed.data.as_ref(), &value));
                    }
                    feed.record_success(value, now);
                }
                Err(err) => {
                    if err.is_decode() {
                        error!(
                            "{} response did not decode, keeping previous data: {}",
                            self.category, err
                        );
                    } else {
                        warn!("{} refresh failed, keeping previous data: {}", self.category, err);
                    }
                    events.push(PollEvent::Failed {
                        category: self.category,
                        error: err.clone(),
                    });
                    feed.record_failure(err, now);
                }
            }

            self.in_flight.store(false, Ordering::Release);
        }

        for event in events {
            self.emit(event);
        }
    }

    fn emit(&self, event: PollEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.try_send(event) {
                debug!("Dropping {} poll event: {}", self.category, e);
            }
        }
    }
}

pub struct PollerBuilder<T> {
    category: PollCategory,
    interval: Duration,
    refresh: RefreshFn<T>,
    clock: Arc<dyn Clock>,
    events: Option<mpsc::Sender<PollEvent>>,
    on_change: Option<ChangeHook<T>>,
}

impl<T: Send + Sync + 'static> PollerBuilder<T> {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn events(mut self, tx: mpsc::Sender<PollEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn on_change<H>(mut self, hook: H) -> Self
    where
        H: Fn(Option<&T>, &T) -> Vec<PollEvent> + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Poller<T> {
        let interval = if self.interval.is_zero() {
            warn!("Zero polling interval for {}, using 1s", self.category);
            Duration::from_secs(1)
        } else {
            self.interval
        };

        Poller {
            shared: Arc::new(Shared {
                category: self.category,
                refresh: self.refresh,
                feed: RwLock::new(Feed::default()),
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                clock: self.clock,
                events: self.events,
                on_change: self.on_change,
            }),
            interval,
            cancel: None,
            timer: None,
        }
    }
}

pub struct Poller<T> {
    shared: Arc<Shared<T>>,
    interval: Duration,
    cancel: Option<CancellationToken>,
    timer: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> Poller<T> {
    pub fn builder<F>(category: PollCategory, interval: Duration, refresh: F) -> PollerBuilder<T>
    where
        F: Fn() -> BoxFuture<'static, Result<T, ServiceError>> + Send + Sync + 'static,
    {
        PollerBuilder {
            category,
            interval,
            refresh: Box::new(refresh),
            clock: Arc::new(SystemClock),
            events: None,
            on_change: None,
        }
    }

    pub fn category(&self) -> PollCategory {
        self.shared.category
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Begin polling. The first refresh is issued right away.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;

        info!("Polling {} every {:?}", shared.category, interval);

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        shared.trigger();
                    }
                }
            }
        }));
        self.cancel = Some(cancel);
    }

    /// Cancel the timer; any response still pending is discarded on arrival
    pub fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };

        cancel.cancel();
        self.timer = None;
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        // A restart may issue a new request while the old one is still out.
        // Both run; only the current generation's response is applied.
        self.shared.in_flight.store(false, Ordering::Release);

        info!("Stopped polling {}", self.shared.category);
    }

    /// Refresh outside the schedule. Returns false when the poller is stopped
    /// or a refresh is already pending.
    pub fn refresh_now(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.shared.trigger()
    }

    pub async fn feed(&self) -> Feed<T>
    where
        T: Clone,
    {
        self.shared.feed.read().await.clone()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures_util::FutureExt;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    const INTERVAL: Duration = Duration::from_secs(30);

    /// Let spawned tasks run; paused time only advances once they are idle
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn counting(calls: Arc<AtomicUsize>) -> Poller<usize> {
        Poller::builder(PollCategory::ActiveTrades, INTERVAL, move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }.boxed()
        })
        .build()
    }

    fn gated(calls: Arc<AtomicUsize>, gate: Arc<Semaphore>) -> Poller<usize> {
        Poller::builder(PollCategory::Stats, INTERVAL, move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let gate = Arc::clone(&gate);
            async move {
                gate.acquire().await.unwrap().forget();
                Ok(n)
            }
            .boxed()
        })
        .build()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_refresh_is_immediate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut poller = counting(Arc::clone(&calls));

        poller.start();
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.feed().await.data, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_on_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut poller = counting(Arc::clone(&calls));

        poller.start();
        settle().await;
        tokio::time::sleep(INTERVAL).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(INTERVAL * 2).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(poller.feed().await.successes, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_skipped_while_in_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let mut poller = gated(Arc::clone(&calls), Arc::clone(&gate));

        poller.start();
        settle().await;
        assert!(poller.is_in_flight());
        assert!(!poller.refresh_now());

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.add_permits(1);
        settle().await;
        assert!(!poller.is_in_flight());
        assert_eq!(poller.feed().await.data, Some(1));

        assert!(poller.refresh_now());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_data() {
        let outcomes = Arc::new(Mutex::new(VecDeque::from(vec![
            Ok(1),
            Err(ServiceError::Network("connection reset".into())),
            Ok(3),
        ])));
        let (tx, mut rx) = mpsc::channel(16);

        let source = Arc::clone(&outcomes);
        let mut poller = Poller::builder(PollCategory::History, INTERVAL, move || {
            let next = source
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ServiceError::Decode("exhausted".into())));
            async move { next }.boxed()
        })
        .events(tx)
        .build();

        poller.start();
        settle().await;
        assert_eq!(rx.recv().await, Some(PollEvent::Refreshed(PollCategory::History)));

        tokio::time::sleep(INTERVAL).await;
        settle().await;
        let feed = poller.feed().await;
        assert_eq!(feed.data, Some(1));
        assert!(feed.refresh_failed());
        assert_eq!(feed.failures, 1);
        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Failed { category: PollCategory::History, .. })
        ));

        tokio::time::sleep(INTERVAL).await;
        settle().await;
        let feed = poller.feed().await;
        assert_eq!(feed.data, Some(3));
        assert!(!feed.refresh_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let mut poller = gated(Arc::clone(&calls), Arc::clone(&gate));

        poller.start();
        settle().await;
        poller.stop();
        assert!(!poller.is_running());

        gate.add_permits(10);
        settle().await;
        tokio::time::sleep(INTERVAL * 4).await;
        settle().await;

        let feed = poller.feed().await;
        assert_eq!(feed.data, None);
        assert_eq!(feed.successes, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!poller.refresh_now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let mut poller = gated(Arc::clone(&calls), Arc::clone(&gate));

        poller.start();
        settle().await;
        poller.stop();
        poller.start();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Both requests resolve; only the current generation's is applied
        gate.add_permits(2);
        settle().await;
        let feed = poller.feed().await;
        assert_eq!(feed.successes, 1);
        assert_eq!(feed.data, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_hook_sees_previous_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (tx, mut rx) = mpsc::channel(16);

        let mut poller = Poller::builder(PollCategory::ActiveTrades, INTERVAL, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as i64 + 1;
            async move { Ok(n) }.boxed()
        })
        .events(tx)
        .on_change(|prev: Option<&i64>, next: &i64| match prev {
            Some(prev) => vec![PollEvent::TradesClosed(vec![*prev, *next])],
            None => Vec::new(),
        })
        .build();

        poller.start();
        settle().await;
        tokio::time::sleep(INTERVAL).await;
        settle().await;

        assert_eq!(rx.recv().await, Some(PollEvent::Refreshed(PollCategory::ActiveTrades)));
        assert_eq!(rx.recv().await, Some(PollEvent::Refreshed(PollCategory::ActiveTrades)));
        assert_eq!(rx.recv().await, Some(PollEvent::TradesClosed(vec![1, 2])));
    }

    #[test]
    fn test_staleness() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let mut feed: Feed<u32> = Feed::default();
        assert!(feed.is_stale(clock.now(), INTERVAL));

        feed.record_success(5, clock.now());
        clock.advance(Duration::from_secs(29));
        assert!(!feed.is_stale(clock.now(), INTERVAL));

        clock.advance(Duration::from_secs(2));
        assert!(feed.is_stale(clock.now(), INTERVAL));

        // failures do not refresh the timestamp
        feed.record_failure(ServiceError::Network("down".into()), clock.now());
        assert!(feed.is_stale(clock.now(), INTERVAL));
        assert_eq!(feed.data(), Some(&5));
    }
}
