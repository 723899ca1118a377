//! Trading backend REST client
//!
//! Thin typed wrapper over the backend's JSON endpoints. Holds no state
//! beyond the connection pool; every failure is normalized to `ServiceError`.

use crate::api::error::ServiceError;
use crate::api::models::{
    BacktestResult, DashboardStats, GlobalSettings, NewWatchlistEntry, Trade, WatchlistEntry,
};
use crate::api::TradingBackend;
use crate::config::BackendConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest body excerpt written to debug logs
const LOG_BODY_CHARS: usize = 200;

pub struct RestClient {
    client: Client,
    base_url: Url,
}

impl RestClient {
    /// Create a client for the backend at `base_url`.
    ///
    /// Without a timeout the transport default applies.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Backend URL cannot be used as a base: {}", base_url);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join path segments onto the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::Request(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ServiceError> {
        let url = self.endpoint(segments)?;
        debug!("Backend request: {} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json"))
    }

    fn with_json<B: Serialize>(
        request: RequestBuilder,
        body: &B,
    ) -> Result<RequestBuilder, ServiceError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| ServiceError::Request(format!("failed to encode body: {}", e)))?;
        Ok(request.header(CONTENT_TYPE, "application/json").body(payload))
    }

    /// Send and return the raw body of a successful response
    async fn execute(&self, request: RequestBuilder) -> Result<String, ServiceError> {
        let response = request.send().await.map_err(ServiceError::from)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        debug!(
            "Backend response: {} - {}",
            status,
            body.chars().take(LOG_BODY_CHARS).collect::<String>()
        );

        if !status.is_success() {
            let err = ServiceError::from_response(status, &body);
            warn!("Backend rejected request: {}", err);
            return Err(err);
        }

        Ok(body)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let body = self.execute(request).await?;
        decode(&body)
    }

    /// For endpoints whose success body carries nothing we need
    async fn acknowledge(&self, request: RequestBuilder) -> Result<(), ServiceError> {
        self.execute(request).await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ServiceError> {
    // Logged by the caller, which knows what was being fetched
    serde_json::from_str(body).map_err(ServiceError::from)
}

#[async_trait]
impl TradingBackend for RestClient {
    async fn fetch_active_trades(&self) -> Result<Vec<Trade>, ServiceError> {
        let request = self.request(Method::GET, &["api", "trades", "active"])?;
        self.fetch(request).await
    }

    async fn fetch_history(&self) -> Result<Vec<Trade>, ServiceError> {
        let request = self.request(Method::GET, &["api", "trades", "history"])?;
        self.fetch(request).await
    }

    async fn fetch_stats(&self) -> Result<DashboardStats, ServiceError> {
        let request = self.request(Method::GET, &["api", "trades", "stats"])?;
        self.fetch(request).await
    }

    async fn fetch_watchlist(&self) -> Result<Vec<WatchlistEntry>, ServiceError> {
        let request = self.request(Method::GET, &["api", "settings", "watchlist"])?;
        self.fetch(request).await
    }

    async fn add_watchlist_entry(
        &self,
        entry: &NewWatchlistEntry,
    ) -> Result<WatchlistEntry, ServiceError> {
        let request = self.request(Method::POST, &["api", "settings", "watchlist"])?;
        self.fetch(Self::with_json(request, entry)?).await
    }

    async fn remove_watchlist_entry(&self, ticker: &str) -> Result<(), ServiceError> {
        let request = self.request(Method::DELETE, &["api", "settings", "watchlist", ticker])?;
        self.acknowledge(request).await
    }

    async fn fetch_global_settings(&self) -> Result<GlobalSettings, ServiceError> {
        let request = self.request(Method::GET, &["api", "settings", "global"])?;
        self.fetch(request).await
    }

    async fn update_global_settings(&self, settings: &GlobalSettings) -> Result<(), ServiceError> {
        let request = self.request(Method::POST, &["api", "settings", "global"])?;
        self.acknowledge(Self::with_json(request, settings)?).await
    }

    async fn run_backtest(&self, ticker: &str) -> Result<BacktestResult, ServiceError> {
        let request = self.request(Method::GET, &["api", "backtest", ticker])?;
        self.fetch(request).await
    }
}
