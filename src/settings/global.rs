use super::mutation::MutationState;
use crate::api::{GlobalSettings, TradingBackend};
use crate::error::{DashboardError, Operation};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Settings as shown to the operator
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub settings: GlobalSettings,
    pub pending: bool,
}

#[derive(Debug, Default)]
struct SettingsState {
    confirmed: Option<GlobalSettings>,
    pending: Option<GlobalSettings>,
    mutation: MutationState,
    needs_resync: bool,
}

/// Owner of the singleton risk parameters. Updates replace the whole record.
pub struct GlobalSettingsManager {
    backend: Arc<dyn TradingBackend>,
    state: RwLock<SettingsState>,
}

impl GlobalSettingsManager {
    pub fn new(backend: Arc<dyn TradingBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(SettingsState::default()),
        }
    }

    pub async fn refresh(&self) -> Result<GlobalSettings, DashboardError> {
        match self.backend.fetch_global_settings().await {
            Ok(settings) => {
                let mut state = self.state.write().await;
                state.confirmed = Some(settings.clone());
                state.needs_resync = false;
                Ok(settings)
            }
            Err(err) => {
                warn!("Failed to load global settings: {}", err);
                Err(DashboardError::classify(Operation::Query, err))
            }
        }
    }

    /// Last settings the backend returned, if any were loaded
    pub async fn current(&self) -> Option<GlobalSettings> {
        self.state.read().await.confirmed.clone()
    }

    pub async fn display(&self) -> Option<SettingsView> {
        let state = self.state.read().await;
        match (&state.pending, &state.confirmed) {
            (Some(pending), _) => Some(SettingsView {
                settings: pending.clone(),
                pending: state.mutation.is_pending(),
            }),
            (None, Some(confirmed)) => Some(SettingsView {
                settings: confirmed.clone(),
                pending: false,
            }),
            (None, None) => None,
        }
    }

    pub async fn state(&self) -> MutationState {
        self.state.read().await.mutation.clone()
    }

    pub async fn needs_resync(&self) -> bool {
        self.state.read().await.needs_resync
    }

    pub async fn update(&self, settings: GlobalSettings) -> Result<GlobalSettings, DashboardError> {
        settings.validate()?;

        {
            let mut state = self.state.write().await;
            state.pending = Some(settings.clone());
            state.mutation = MutationState::Pending;
        }

        if let Err(err) = self.backend.update_global_settings(&settings).await {
            let error = DashboardError::classify(Operation::Replace, err);
            warn!("Global settings update failed: {}", error);

            let mut state = self.state.write().await;
            state.pending = None;
            state.mutation = MutationState::RolledBack {
                reason: error.to_string(),
            };
            return Err(error);
        }

        info!(
            "Global settings updated: stop loss {}%, take profit {}%, allocation {}%, trading {}",
            settings.global_stop_loss_pct,
            settings.take_profit_pct,
            settings.max_trade_allocation_pct,
            if settings.is_trading_enabled { "on" } else { "off" }
        );

        let refreshed = self.backend.fetch_global_settings().await;

        let mut state = self.state.write().await;
        state.pending = None;
        state.mutation = MutationState::Confirmed;
        match refreshed {
            Ok(confirmed) => {
                state.confirmed = Some(confirmed.clone());
                state.needs_resync = false;
                Ok(confirmed)
            }
            Err(err) => {
                warn!("Global settings were accepted but re-sync failed: {}", err);
                state.needs_resync = true;
                Ok(settings)
            }
        }
    }
}
