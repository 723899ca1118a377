//! Backtest review: request sessions and timeline assembly

mod session;
mod timeline;

pub use session::{BacktestSession, BacktestView};
pub use timeline::{PointKind, Timeline, TimelinePoint};
