use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type TradeId = i64;

/// Inclusive range a numeric setting must fall in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(field: &'static str, min: f64, max: f64) -> Self {
        Self { field, min, max }
    }

    pub fn check(&self, value: f64) -> Result<(), ValidationError> {
        if value.is_finite() && value >= self.min && value <= self.max {
            Ok(())
        } else {
            Err(ValidationError::OutOfRange {
                field: self.field,
                min: self.min,
                max: self.max,
                value,
            })
        }
    }
}

pub const STOP_LOSS_BOUNDS: Bounds = Bounds::new("global_stop_loss_pct", 1.0, 50.0);
pub const TAKE_PROFIT_BOUNDS: Bounds = Bounds::new("take_profit_pct", 1.0, 200.0);
pub const ALLOCATION_BOUNDS: Bounds = Bounds::new("max_trade_allocation_pct", 0.1, 100.0);
pub const CONCURRENCY_BOUNDS: Bounds = Bounds::new("max_concurrent_trades", 1.0, 10.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    #[serde(rename = "BUY", alias = "buy")]
    Buy,
    #[serde(rename = "SELL", alias = "sell")]
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    #[serde(rename = "OPEN", alias = "ACTIVE", alias = "open", alias = "active")]
    Active,
    #[serde(rename = "CLOSED", alias = "closed")]
    Closed,
    #[serde(rename = "PENDING", alias = "pending")]
    Pending,
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Active => write!(f, "OPEN"),
            TradeStatus::Closed => write!(f, "CLOSED"),
            TradeStatus::Pending => write!(f, "PENDING"),
        }
    }
}

/// A trade as reported by the backend. Read-only on this side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    #[serde(default)]
    pub exit_price: Option<Decimal>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub entry_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub exit_time: Option<DateTime<Utc>>,
    pub status: TradeStatus,
    #[serde(default)]
    pub pnl: Option<Decimal>,
    #[serde(default)]
    pub pnl_percent: Option<Decimal>,
}

impl Trade {
    pub fn is_active(&self) -> bool {
        self.status == TradeStatus::Active
    }

    /// Entry price times quantity; `None` when that overflows `Decimal`
    pub fn cost_basis(&self) -> Option<Decimal> {
        self.entry_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_investment: Decimal,
    pub day_change_pct: Decimal,
    pub yesterday_change_pct: Decimal,
}

fn default_true() -> bool {
    true
}

/// A tradable symbol as persisted by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub ticker: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_trades: Option<u32>,
}

/// Body of an "add to watchlist" request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWatchlistEntry {
    pub ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_trades: Option<u32>,
}

impl NewWatchlistEntry {
    pub fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            company_name: None,
            is_active: true,
            max_concurrent_trades: None,
        }
    }

    pub fn with_company_name(mut self, name: &str) -> Self {
        self.company_name = Some(name.to_string());
        self
    }

    pub fn with_concurrency_limit(mut self, limit: u32) -> Self {
        self.max_concurrent_trades = Some(limit);
        self
    }

    /// Trim and upper-case the ticker, drop a blank company name
    pub fn normalized(mut self) -> Self {
        self.ticker = normalize_ticker(&self.ticker);
        self.company_name = self
            .company_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ticker.trim().is_empty() {
            return Err(ValidationError::EmptyTicker);
        }
        if let Some(limit) = self.max_concurrent_trades {
            CONCURRENCY_BOUNDS.check(f64::from(limit))?;
        }
        Ok(())
    }

    /// What the entry is expected to look like before the backend confirms it
    pub fn preview(&self) -> WatchlistEntry {
        WatchlistEntry {
            id: None,
            ticker: self.ticker.clone(),
            company_name: self.company_name.clone(),
            is_active: self.is_active,
            max_concurrent_trades: self.max_concurrent_trades,
        }
    }
}

pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

fn default_take_profit() -> f64 {
    10.0
}

/// Singleton risk parameters. Always written as a whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub global_stop_loss_pct: f64,
    #[serde(default = "default_take_profit", alias = "tacke_profit_pct")]
    pub take_profit_pct: f64,
    pub max_trade_allocation_pct: f64,
    pub is_trading_enabled: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            global_stop_loss_pct: 5.0,
            take_profit_pct: default_take_profit(),
            max_trade_allocation_pct: 2.0,
            is_trading_enabled: false,
        }
    }
}

impl GlobalSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        STOP_LOSS_BOUNDS.check(self.global_stop_loss_pct)?;
        TAKE_PROFIT_BOUNDS.check(self.take_profit_pct)?;
        ALLOCATION_BOUNDS.check(self.max_trade_allocation_pct)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_trades: u32,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub total_return_pct: Decimal,
    pub win_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "EOD")]
    EndOfDay,
    #[serde(rename = "SIGNAL")]
    Signal,
    #[serde(other)]
    Other,
}

/// One simulated round trip. Exit fields are absent while the position is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    #[serde(default)]
    pub ticker: Option<String>,
    pub entry_price: Decimal,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub entry_time: DateTime<Utc>,
    #[serde(default)]
    pub exit_price: Option<Decimal>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pnl: Option<Decimal>,
    #[serde(default)]
    pub pnl_percent: Option<Decimal>,
    #[serde(default)]
    pub exit_reason: Option<ExitReason>,
}

impl BacktestTrade {
    /// Exit time and price, when the trade was closed
    pub fn exit(&self) -> Option<(DateTime<Utc>, Decimal)> {
        self.exit_time.zip(self.exit_price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub time: DateTime<Utc>,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub ticker: String,
    pub summary: BacktestSummary,
    #[serde(default)]
    pub trades: Vec<BacktestTrade>,
    #[serde(rename = "chart_data", default)]
    pub prices: Vec<PricePoint>,
}

/// Timestamps arrive either as RFC 3339 or as naive ISO-8601 (treated as UTC)
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_parsing() {
        let json = r#"{
            "id": 7,
            "symbol": "AAPL",
            "side": "BUY",
            "quantity": 10,
            "entry_price": 150.5,
            "exit_price": null,
            "entry_time": "2024-03-01T14:30:00",
            "exit_time": null,
            "status": "OPEN",
            "pnl": null,
            "pnl_percent": null
        }"#;

        let trade: Trade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.id, 7);
        assert_eq!(trade.side, TradeSide::Buy);
        assert!(trade.is_active());
        assert_eq!(trade.cost_basis(), Some(dec!(1505)));
        assert_eq!(
            trade.entry_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap())
        );
        assert_eq!(trade.exit_time, None);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        assert_eq!(timestamp::parse("2024-03-01T14:30:00Z"), Some(expected));
        assert_eq!(timestamp::parse("2024-03-01T16:30:00+02:00"), Some(expected));
        assert_eq!(timestamp::parse("2024-03-01 14:30:00"), Some(expected));
        assert_eq!(timestamp::parse("2024-03-01T14:30:00.000000"), Some(expected));
        assert_eq!(timestamp::parse("yesterday"), None);
    }

    #[test]
    fn test_global_settings_bounds() {
        assert!(GlobalSettings::default().validate().is_ok());

        let too_much = GlobalSettings {
            max_trade_allocation_pct: 150.0,
            ..Default::default()
        };
        assert!(matches!(
            too_much.validate(),
            Err(ValidationError::OutOfRange { field: "max_trade_allocation_pct", .. })
        ));

        let nan = GlobalSettings {
            global_stop_loss_pct: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let edge = GlobalSettings {
            global_stop_loss_pct: 50.0,
            take_profit_pct: 200.0,
            max_trade_allocation_pct: 0.1,
            is_trading_enabled: true,
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_global_settings_legacy_field_name() {
        let json = r#"{
            "global_stop_loss_pct": 4,
            "tacke_profit_pct": 12,
            "max_trade_allocation_pct": 2.5,
            "is_trading_enabled": true
        }"#;
        let settings: GlobalSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.take_profit_pct, 12.0);

        let without: GlobalSettings = serde_json::from_str(
            r#"{"global_stop_loss_pct": 4, "max_trade_allocation_pct": 2,
                "is_trading_enabled": false, "id": 1}"#,
        )
        .unwrap();
        assert_eq!(without.take_profit_pct, 10.0);
    }

    #[test]
    fn test_new_entry_normalization() {
        let entry = NewWatchlistEntry::new("  amzn ")
            .with_company_name("  ")
            .normalized();
        assert_eq!(entry.ticker, "AMZN");
        assert_eq!(entry.company_name, None);

        assert_eq!(
            NewWatchlistEntry::new("   ").normalized().validate(),
            Err(ValidationError::EmptyTicker)
        );
        assert!(NewWatchlistEntry::new("TSLA")
            .with_concurrency_limit(11)
            .validate()
            .is_err());

        let body = serde_json::to_value(NewWatchlistEntry::new("TSLA")).unwrap();
        assert_eq!(body, serde_json::json!({"ticker": "TSLA", "is_active": true}));
    }

    #[test]
    fn test_backtest_result_parsing() {
        let json = r#"{
            "ticker": "AAPL",
            "summary": {
                "initial_balance": 10000,
                "final_balance": 10250.5,
                "total_return_pct": 2.51,
                "total_trades": 2,
                "win_rate": 50.0
            },
            "trades": [
                {
                    "ticker": "AAPL",
                    "entry_price": 100.0,
                    "entry_time": "2024-03-01T14:30:00",
                    "exit_price": 105.0,
                    "exit_time": "2024-03-01T15:00:00",
                    "pnl": 500.0,
                    "pnl_percent": 5.0,
                    "exit_reason": "SIGNAL"
                },
                {
                    "ticker": "AAPL",
                    "entry_price": 104.0,
                    "entry_time": "2024-03-01T15:30:00",
                    "exit_reason": "TRAILING"
                }
            ],
            "chart_data": [
                {"time": "2024-03-01T14:30:00", "price": 100.0},
                {"time": "2024-03-01T15:00:00", "price": 105.0}
            ]
        }"#;

        let result: BacktestResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.summary.total_trades, 2);
        assert_eq!(result.summary.final_balance, dec!(10250.5));
        assert_eq!(result.prices.len(), 2);
        assert_eq!(result.trades[0].exit_reason, Some(ExitReason::Signal));
        assert!(result.trades[0].exit().is_some());
        assert_eq!(result.trades[1].exit_reason, Some(ExitReason::Other));
        assert!(result.trades[1].exit().is_none());
    }
}
