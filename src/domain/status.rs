//! Per-cycle status summary emitted to the status sink.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::regime::Regime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetStatus {
    pub asset_id: String,
    pub regime: Regime,
    pub score: u32,
    pub strength: f64,
    pub price: f64,
}

/// What one control-loop cycle did, in one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatus {
    pub timestamp: DateTime<Utc>,
    pub cycle: u64,
    pub assets: Vec<AssetStatus>,
    pub decisions: usize,
    pub orders_executed: usize,
    pub orders_failed: usize,
    pub open_positions: usize,
    /// Open positions whose asset produced no analysis this cycle; their
    /// stop and target checks were skipped for lack of a trusted price.
    pub stale_positions: Vec<String>,
    pub equity: f64,
    pub consecutive_failures: u32,
    /// Set when consecutive failures reached the alert threshold.
    pub alert: bool,
}
