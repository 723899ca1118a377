pub mod api;
pub mod backtest;
pub mod config;
pub mod error;
pub mod settings;
pub mod sync;
pub mod ui;

pub use config::Config;
pub use error::DashboardError;
