//! Operator-driven mutations of backend configuration

pub mod global;
pub mod mutation;
pub mod watchlist;

pub use global::{GlobalSettingsManager, SettingsView};
pub use mutation::{MutationState, MutationTracker};
pub use watchlist::{PendingKind, WatchlistManager, WatchlistRow};
