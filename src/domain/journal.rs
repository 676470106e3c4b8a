//! Journal document types.
//!
//! Transactions are append-only; daily snapshots are upserted by date.
//! Serialization stays stable so journals written by older builds keep
//! loading.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// What kind of portfolio action a trade represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Entry,
    Pyramid,
    PartialExit,
    Exit,
}

/// One executed (or simulated) order, as recorded in the journal.
///
/// `realized_pnl` and `realized_pnl_pct` are set on sells only; buys carry
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub timestamp: DateTime<Utc>,
    /// Calendar date of the fill, for daily grouping.
    pub date: NaiveDate,
    pub asset_id: String,
    pub kind: TradeKind,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    /// Notional value of the fill (quantity times price).
    pub amount: f64,
    pub order_ref: String,
    pub reason: String,
    pub realized_pnl: Option<f64>,
    pub realized_pnl_pct: Option<f64>,
    pub dry_run: bool,
}

/// Market value of one open position at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub asset_id: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
}

/// End-of-cycle portfolio state, one per calendar date.
///
/// `daily_pnl`, `daily_pnl_pct`, `cumulative_pnl` and `cumulative_pnl_pct`
/// are derived by the journal store at upsert time from the previous
/// snapshot and the starting capital; values supplied by the caller are
/// overwritten there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    /// Cash plus the market value of all open positions.
    pub total_assets: f64,
    pub cash: f64,
    /// Market value held in open positions.
    pub invested: f64,
    pub open_positions: usize,
    /// Cumulative realized profit and loss since the journal began.
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub cumulative_pnl: f64,
    pub cumulative_pnl_pct: f64,
    pub daily_pnl: f64,
    pub daily_pnl_pct: f64,
    pub trades_today: usize,
    pub positions_summary: Vec<PositionSummary>,
}
