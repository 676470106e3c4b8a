//! Open positions and the portfolio position store.
//!
//! `entry_price` is the price of the first fill and never changes; pyramid
//! gain checks measure against it. Cost-basis accounting uses `avg_cost`,
//! which does move as entries are added.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub asset_id: String,
    /// Price of the original entry. Pyramiding does not move it.
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
    /// Volume-weighted cost across all entries.
    pub avg_cost: f64,
    pub stop_loss_price: f64,
    pub first_target_price: f64,
    pub second_target_price: f64,
    pub first_target_hit: bool,
    /// Set if a partial exit at the second target is ever taken; the
    /// current flow exits the full position there instead.
    #[serde(default)]
    pub second_target_hit: bool,
    /// Number of entries made so far (1 = original only).
    pub entry_count: u32,
}

impl Position {
    pub fn open(
        asset_id: &str,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        quantity: f64,
        stop_loss_price: f64,
        first_target_price: f64,
        second_target_price: f64,
    ) -> Position {
        Position {
            asset_id: asset_id.to_string(),
            entry_price,
            entry_time,
            quantity,
            avg_cost: entry_price,
            stop_loss_price,
            first_target_price,
            second_target_price,
            first_target_hit: false,
            second_target_hit: false,
            entry_count: 1,
        }
    }

    /// Add a pyramid entry, reweighting the cost basis.
    pub fn add_entry(&mut self, price: f64, quantity: f64, new_stop: f64) {
        let total = self.quantity + quantity;
        if total > 0.0 {
            self.avg_cost = (self.avg_cost * self.quantity + price * quantity) / total;
        }
        self.quantity = total;
        self.entry_count += 1;
        // A pyramid never loosens the stop.
        if new_stop > self.stop_loss_price {
            self.stop_loss_price = new_stop;
        }
    }

    /// Take profit on half the position and move the stop to breakeven.
    ///
    /// Returns the quantity sold.
    pub fn take_partial(&mut self) -> f64 {
        let sold = self.quantity / 2.0;
        self.quantity -= sold;
        self.first_target_hit = true;
        self.stop_loss_price = self.stop_loss_price.max(self.avg_cost);
        sold
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.avg_cost) * self.quantity
    }

    /// Gain over the original entry, in percent.
    pub fn gain_pct(&self, price: f64) -> f64 {
        if self.entry_price > 0.0 {
            (price - self.entry_price) / self.entry_price * 100.0
        } else {
            0.0
        }
    }
}

/// All open positions, keyed by asset. At most one position per asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionStore {
    positions: BTreeMap<String, Position>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset_id: &str) -> Option<&Position> {
        self.positions.get(asset_id)
    }

    pub fn get_mut(&mut self, asset_id: &str) -> Option<&mut Position> {
        self.positions.get_mut(asset_id)
    }

    pub fn insert(&mut self, position: Position) {
        self.positions.insert(position.asset_id.clone(), position);
    }

    pub fn remove(&mut self, asset_id: &str) -> Option<Position> {
        self.positions.remove(asset_id)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Positions in asset-id order.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }
}
