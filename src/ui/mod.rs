pub mod format;
pub mod view_model;

pub use format::{format_money, format_percent, PercentChange, Trend};
pub use view_model::{BacktestSummaryView, DashboardViewModel, Notice, NoticeKind, TradeRow};
