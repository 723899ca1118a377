//! Merged price series and trade markers for backtest review

use crate::api::{BacktestTrade, PricePoint};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Price,
    Buy,
    Sell,
}

impl PointKind {
    pub fn is_marker(&self) -> bool {
        !matches!(self, PointKind::Price)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PointKind::Price => "price",
            PointKind::Buy => "BUY",
            PointKind::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for PointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub kind: PointKind,
    /// Index into the backtest's trade list, markers only
    pub trade_index: Option<usize>,
    /// Realised pnl percent, sell markers only
    pub pnl_percent: Option<Decimal>,
}

impl TimelinePoint {
    fn price(point: &PricePoint) -> Self {
        Self {
            timestamp: point.time,
            price: point.price,
            kind: PointKind::Price,
            trade_index: None,
            pnl_percent: None,
        }
    }
}

/// Ordered by timestamp. At the same instant price points come first, then
/// markers in trade order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    points: Vec<TimelinePoint>,
}

impl Timeline {
    pub fn assemble(prices: &[PricePoint], trades: &[BacktestTrade]) -> Self {
        let mut points: Vec<TimelinePoint> = prices.iter().map(TimelinePoint::price).collect();

        for (index, trade) in trades.iter().enumerate() {
            points.push(TimelinePoint {
                timestamp: trade.entry_time,
                price: trade.entry_price,
                kind: PointKind::Buy,
                trade_index: Some(index),
                pnl_percent: None,
            });

            // Open positions have no exit to plot
            if let Some((exit_time, exit_price)) = trade.exit() {
                points.push(TimelinePoint {
                    timestamp: exit_time,
                    price: exit_price,
                    kind: PointKind::Sell,
                    trade_index: Some(index),
                    pnl_percent: trade.pnl_percent,
                });
            }
        }

        // Stable: equal keys keep insertion order
        points.sort_by_key(|p| (p.timestamp, p.kind.is_marker()));

        Self { points }
    }

    pub fn points(&self) -> &[TimelinePoint] {
        &self.points
    }

    pub fn markers(&self) -> impl Iterator<Item = &TimelinePoint> {
        self.points.iter().filter(|p| p.kind.is_marker())
    }

    pub fn price_points(&self) -> impl Iterator<Item = &TimelinePoint> {
        self.points.iter().filter(|p| !p.kind.is_marker())
    }

    /// Lowest and highest price over every point, markers included
    pub fn price_range(&self) -> Option<(Decimal, Decimal)> {
        let mut prices = self.points.iter().map(|p| p.price);
        let first = prices.next()?;
        Some(prices.fold((first, first), |(lo, hi), price| {
            (lo.min(price), hi.max(price))
        }))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
