//! Presentation-ready aggregates, re-derived from each snapshot

use super::format::{format_money, format_percent, format_signed, PercentChange, Trend};
use crate::api::{BacktestSummary, Trade, TradeId, TradeStatus};
use crate::sync::{DashboardSnapshot, Feed, PollCategory};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRow {
    pub id: TradeId,
    pub symbol: String,
    pub side: String,
    pub quantity: String,
    pub entry_price: String,
    pub exit_price: Option<String>,
    pub pnl: Option<String>,
    pub pnl_percent: Option<PercentChange>,
    pub trend: Option<Trend>,
}

impl TradeRow {
    fn from_trade(trade: &Trade) -> Self {
        Self {
            id: trade.id,
            symbol: trade.symbol.clone(),
            side: trade.side.to_string(),
            quantity: trade.quantity.normalize().to_string(),
            entry_price: format_money(trade.entry_price),
            exit_price: trade.exit_price.map(format_money),
            pnl: trade.pnl.map(format_signed),
            pnl_percent: trade.pnl_percent.map(PercentChange::of),
            trend: trade.pnl.or(trade.pnl_percent).map(Trend::of),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Loading,
    Stale,
    RefreshFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub category: PollCategory,
    pub kind: NoticeKind,
    pub message: String,
}

fn notices_for<T>(category: PollCategory, feed: &Feed<T>, stale: bool) -> Vec<Notice> {
    let mut notices = Vec::new();

    if let Some(err) = &feed.last_error {
        notices.push(Notice {
            category,
            kind: NoticeKind::RefreshFailed,
            message: format!("Last {} refresh failed: {}", category, err.user_message()),
        });
    }

    match feed.last_success {
        None if feed.last_error.is_none() => notices.push(Notice {
            category,
            kind: NoticeKind::Loading,
            message: format!("Waiting for first {} refresh", category),
        }),
        Some(at) if stale => notices.push(Notice {
            category,
            kind: NoticeKind::Stale,
            message: format!(
                "Showing stale {}, last updated {}",
                category,
                at.format("%H:%M:%S UTC")
            ),
        }),
        _ => {}
    }

    notices
}

/// Realised totals over closed trades that report a pnl. A trade whose
/// notional does not fit in a `Decimal` is left out of every total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Realised {
    pnl: Decimal,
    cost_basis: Decimal,
    trades: u32,
    winners: u32,
    skipped: u32,
}

impl Realised {
    fn over(history: &[Trade]) -> Self {
        let mut totals = Realised::default();

        for trade in history.iter().filter(|t| t.status == TradeStatus::Closed) {
            let Some(pnl) = trade.pnl else {
                continue;
            };
            let sums = trade.cost_basis().and_then(|cost| {
                Some((
                    totals.pnl.checked_add(pnl)?,
                    totals.cost_basis.checked_add(cost)?,
                ))
            });
            let Some((pnl_sum, cost_sum)) = sums else {
                totals.skipped += 1;
                continue;
            };

            totals.pnl = pnl_sum;
            totals.cost_basis = cost_sum;
            totals.trades += 1;
            if pnl > Decimal::ZERO {
                totals.winners += 1;
            }
        }

        if totals.skipped > 0 {
            warn!(
                "Left {} closed trade(s) out of realised totals: notional too large",
                totals.skipped
            );
        }
        totals
    }

    fn pnl_pct(&self) -> Option<Decimal> {
        self.pnl
            .checked_div(self.cost_basis)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }

    fn win_rate(&self) -> Option<Decimal> {
        if self.trades == 0 {
            return None;
        }
        Some(Decimal::from(self.winners) / Decimal::from(self.trades) * Decimal::ONE_HUNDRED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardViewModel {
    pub generated_at: DateTime<Utc>,
    pub total_investment: Option<String>,
    pub day_change: Option<PercentChange>,
    pub yesterday_change: Option<PercentChange>,
    pub active: Vec<TradeRow>,
    pub history: Vec<TradeRow>,
    pub active_count: usize,
    pub closed_count: usize,
    pub net_pnl: Option<String>,
    pub net_pnl_trend: Option<Trend>,
    pub net_pnl_pct: Option<PercentChange>,
    pub win_rate: Option<String>,
    pub notices: Vec<Notice>,
}

impl DashboardViewModel {
    pub fn derive(snapshot: &DashboardSnapshot) -> Self {
        let active = snapshot.active.data().map(Vec::as_slice).unwrap_or_default();
        let history = snapshot.history.data().map(Vec::as_slice).unwrap_or_default();
        let stats = snapshot.stats.data();
        let realised = Realised::over(history);

        let mut notices = Vec::new();
        for category in PollCategory::ALL {
            let stale = snapshot.freshness.is_stale(category);
            notices.extend(match category {
                PollCategory::ActiveTrades => notices_for(category, &snapshot.active, stale),
                PollCategory::History => notices_for(category, &snapshot.history, stale),
                PollCategory::Stats => notices_for(category, &snapshot.stats, stale),
            });
        }

        Self {
            generated_at: snapshot.taken_at,
            total_investment: stats.map(|s| format_money(s.total_investment)),
            day_change: stats.map(|s| PercentChange::of(s.day_change_pct)),
            yesterday_change: stats.map(|s| PercentChange::of(s.yesterday_change_pct)),
            active: active.iter().map(TradeRow::from_trade).collect(),
            history: history.iter().map(TradeRow::from_trade).collect(),
            active_count: active.len(),
            closed_count: history
                .iter()
                .filter(|t| t.status == TradeStatus::Closed)
                .count(),
            net_pnl: (realised.trades > 0).then(|| format_signed(realised.pnl)),
            net_pnl_trend: (realised.trades > 0).then(|| Trend::of(realised.pnl)),
            net_pnl_pct: realised.pnl_pct().map(PercentChange::of),
            win_rate: realised.win_rate().map(format_percent),
            notices,
        }
    }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn write_rows(f: &mut fmt::Formatter<'_>, rows: &[TradeRow]) -> fmt::Result {
    for row in rows {
        writeln!(
            f,
            "  #{:<6} {:<8} {:<4} {:>10} @ {:>12} -> {:>12}  {:>12} {}",
            row.id,
            row.symbol,
            row.side,
            row.quantity,
            row.entry_price,
            or_dash(&row.exit_price),
            or_dash(&row.pnl),
            row.pnl_percent
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_default(),
        )?;
    }
    Ok(())
}

impl fmt::Display for DashboardViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Dashboard @ {} ===", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "Total investment: {}", or_dash(&self.total_investment))?;
        if let (Some(day), Some(yesterday)) = (&self.day_change, &self.yesterday_change) {
            writeln!(f, "Today: {}   Yesterday: {}", day, yesterday)?;
        }
        writeln!(
            f,
            "Net P&L: {} ({})   Win rate: {}",
            or_dash(&self.net_pnl),
            self.net_pnl_pct
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".into()),
            or_dash(&self.win_rate)
        )?;

        writeln!(f, "Active trades ({}):", self.active_count)?;
        write_rows(f, &self.active)?;
        writeln!(f, "History ({} closed):", self.closed_count)?;
        write_rows(f, &self.history)?;

        for notice in &self.notices {
            writeln!(f, "! {}", notice.message)?;
        }
        Ok(())
    }
}

/// Formatted backtest summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktestSummaryView {
    pub total_trades: u32,
    pub initial_balance: String,
    pub final_balance: String,
    /// Absent when the balances are too large to subtract
    pub net_profit: Option<String>,
    pub total_return: PercentChange,
    pub win_rate: String,
}

impl BacktestSummaryView {
    pub fn derive(summary: &BacktestSummary) -> Self {
        Self {
            total_trades: summary.total_trades,
            initial_balance: format_money(summary.initial_balance),
            final_balance: format_money(summary.final_balance),
            net_profit: summary
                .final_balance
                .checked_sub(summary.initial_balance)
                .map(format_signed),
            total_return: PercentChange::of(summary.total_return_pct),
            win_rate: format_percent(summary.win_rate),
        }
    }
}

impl fmt::Display for BacktestSummaryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trades:          {}", self.total_trades)?;
        writeln!(f, "Initial balance: {}", self.initial_balance)?;
        writeln!(f, "Final balance:   {}", self.final_balance)?;
        writeln!(f, "Net profit:      {}", or_dash(&self.net_profit))?;
        writeln!(f, "Total return:    {}", self.total_return)?;
        writeln!(f, "Win rate:        {}", self.win_rate)
    }
}
