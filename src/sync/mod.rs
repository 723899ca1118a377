//! Polling of live trading state

pub mod dashboard;
pub mod diff;
pub mod scheduler;

pub use dashboard::{DashboardSnapshot, DashboardSync, Freshness};
pub use diff::TradeDiff;
pub use scheduler::{Clock, Feed, ManualClock, PollCategory, PollEvent, Poller, SystemClock};
