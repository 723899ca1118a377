use anyhow::{bail, Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Unset means the transport's own default applies
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_active_trades_secs")]
    pub active_trades_secs: u64,
    #[serde(default = "default_history_secs")]
    pub history_secs: u64,
    #[serde(default = "default_stats_secs")]
    pub stats_secs: u64,
    /// A feed counts as stale after this many intervals without a success
    #[serde(default = "default_stale_after_intervals")]
    pub stale_after_intervals: u32,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_active_trades_secs() -> u64 {
    30
}

fn default_history_secs() -> u64 {
    30
}

fn default_stats_secs() -> u64 {
    60
}

fn default_stale_after_intervals() -> u32 {
    2
}

fn default_event_buffer() -> usize {
    64
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active_trades_secs: default_active_trades_secs(),
            history_secs: default_history_secs(),
            stats_secs: default_stats_secs(),
            stale_after_intervals: default_stale_after_intervals(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PollingConfig {
    pub fn active_trades_interval(&self) -> Duration {
        Duration::from_secs(self.active_trades_secs)
    }

    pub fn history_interval(&self) -> Duration {
        Duration::from_secs(self.history_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_secs)
    }
}

/// `DASHBOARD_` prefix, `__` between nested keys
fn environment() -> Environment {
    Environment::with_prefix("DASHBOARD")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path` (optional) with `DASHBOARD_*` environment overrides,
    /// e.g. `DASHBOARD_BACKEND__BASE_URL`
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: &Path, env: Environment) -> Result<Self> {
        let settings = ConfigLoader::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.backend.base_url)
            .with_context(|| format!("Invalid backend.base_url: {}", self.backend.base_url))?;

        let polling = &self.polling;
        if polling.active_trades_secs == 0 || polling.history_secs == 0 || polling.stats_secs == 0 {
            bail!("Polling intervals must be at least one second");
        }
        if polling.stale_after_intervals == 0 {
            bail!("polling.stale_after_intervals must be at least 1");
        }
        if polling.event_buffer == 0 {
            bail!("polling.event_buffer must be at least 1");
        }
        Ok(())
    }

    fn config_path() -> PathBuf {
        // Try local config first, then next to the executable
        let local_config = PathBuf::from("config/default.toml");
        if local_config.exists() {
            return local_config;
        }

        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let exe_config = exe_dir.join("config/default.toml");
                if exe_config.exists() {
                    return exe_config;
                }
            }
        }

        local_config
    }
}
