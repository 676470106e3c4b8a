//! Deterministic multi-asset backtest engine.
//!
//! Replays historical candles through the same indicator, regime, scoring
//! and arbitration code the live loop uses; order execution is simulated
//! with a slippage and commission model instead of going through the
//! executor. All state is kept in ordered collections so replaying the same
//! input and configuration twice yields identical output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::arbitrator::{self, AssetAnalysis, DecisionKind};
use crate::domain::candle::Candle;
use crate::domain::config::TradingConfig;
use crate::domain::indicator::IndicatorSet;
use crate::domain::journal::{Side, TradeKind};
use crate::domain::metrics::{self, PerformanceMetrics};
use crate::domain::position::{Position, PositionStore};
use crate::domain::regime;
use crate::domain::scorer;

const PERIODS_PER_YEAR: f64 = 252.0;

/// One simulated fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestTrade {
    pub timestamp: DateTime<Utc>,
    pub asset_id: String,
    pub kind: TradeKind,
    pub side: Side,
    pub quantity: f64,
    /// Fill price after slippage.
    pub price: f64,
    pub commission: f64,
    /// Realized profit or loss; zero for buys.
    pub realized_pnl: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub final_equity: f64,
    pub metrics: PerformanceMetrics,
}

pub struct BacktestEngine<'a> {
    cfg: &'a TradingConfig,
}

struct Book {
    positions: PositionStore,
    cash: f64,
    trades: Vec<BacktestTrade>,
    trade_pnls: Vec<f64>,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(cfg: &'a TradingConfig) -> Self {
        BacktestEngine { cfg }
    }

    fn buy_price(&self, price: f64) -> f64 {
        price * (1.0 + self.cfg.backtest.slippage_pct / 100.0)
    }

    fn sell_price(&self, price: f64) -> f64 {
        price * (1.0 - self.cfg.backtest.slippage_pct / 100.0)
    }

    fn commission(&self, notional: f64) -> f64 {
        notional * self.cfg.backtest.commission_pct / 100.0
    }

    fn buy(
        &self,
        book: &mut Book,
        timestamp: DateTime<Utc>,
        asset_id: &str,
        kind: TradeKind,
        mut quantity: f64,
        price: f64,
        reason: &str,
    ) -> Option<(f64, f64)> {
        let eff = self.buy_price(price);
        let rate = self.cfg.backtest.commission_pct / 100.0;
        let mut cost = quantity * eff * (1.0 + rate);
        if cost > book.cash {
            // Scale the order down to what the cash balance affords.
            quantity = book.cash / (eff * (1.0 + rate));
            cost = quantity * eff * (1.0 + rate);
        }
        if quantity <= 1e-9 {
            return None;
        }
        let commission = self.commission(quantity * eff);
        book.cash -= cost;
        book.trades.push(BacktestTrade {
            timestamp,
            asset_id: asset_id.to_string(),
            kind,
            side: Side::Buy,
            quantity,
            price: eff,
            commission,
            realized_pnl: 0.0,
            reason: reason.to_string(),
        });
        Some((quantity, eff))
    }

    fn sell(
        &self,
        book: &mut Book,
        timestamp: DateTime<Utc>,
        asset_id: &str,
        kind: TradeKind,
        quantity: f64,
        price: f64,
        avg_cost: f64,
        reason: &str,
    ) {
        let eff = self.sell_price(price);
        let commission = self.commission(quantity * eff);
        let pnl = (eff - avg_cost) * quantity - commission;
        book.cash += quantity * eff - commission;
        book.trade_pnls.push(pnl);
        book.trades.push(BacktestTrade {
            timestamp,
            asset_id: asset_id.to_string(),
            kind,
            side: Side::Sell,
            quantity,
            price: eff,
            commission,
            realized_pnl: pnl,
            reason: reason.to_string(),
        });
    }

    fn apply(
        &self,
        book: &mut Book,
        timestamp: DateTime<Utc>,
        decision: &arbitrator::Decision,
    ) {
        match decision.kind {
            DecisionKind::Enter {
                stop_loss_price,
                first_target_price,
                second_target_price,
                ..
            } => {
                if let Some((quantity, eff)) = self.buy(
                    book,
                    timestamp,
                    &decision.asset_id,
                    TradeKind::Entry,
                    decision.quantity,
                    decision.price,
                    decision.reason_label(),
                ) {
                    book.positions.insert(Position::open(
                        &decision.asset_id,
                        eff,
                        timestamp,
                        quantity,
                        stop_loss_price,
                        first_target_price,
                        second_target_price,
                    ));
                }
            }
            DecisionKind::Pyramid {
                stop_loss_price, ..
            } => {
                if let Some((quantity, eff)) = self.buy(
                    book,
                    timestamp,
                    &decision.asset_id,
                    TradeKind::Pyramid,
                    decision.quantity,
                    decision.price,
                    decision.reason_label(),
                ) {
                    if let Some(position) = book.positions.get_mut(&decision.asset_id) {
                        position.add_entry(eff, quantity, stop_loss_price);
                    }
                }
            }
            DecisionKind::PartialExit => {
                let Some(position) = book.positions.get_mut(&decision.asset_id) else {
                    return;
                };
                let avg_cost = position.avg_cost;
                let sold = position.take_partial();
                self.sell(
                    book,
                    timestamp,
                    &decision.asset_id,
                    TradeKind::PartialExit,
                    sold,
                    decision.price,
                    avg_cost,
                    decision.reason_label(),
                );
            }
            DecisionKind::Exit { .. } => {
                let Some(position) = book.positions.remove(&decision.asset_id) else {
                    return;
                };
                self.sell(
                    book,
                    timestamp,
                    &decision.asset_id,
                    TradeKind::Exit,
                    position.quantity,
                    decision.price,
                    position.avg_cost,
                    decision.reason_label(),
                );
            }
        }
    }

    fn equity(&self, book: &Book, last_price: &BTreeMap<String, f64>) -> f64 {
        book.cash
            + book
                .positions
                .iter()
                .map(|p| {
                    p.quantity * last_price.get(&p.asset_id).copied().unwrap_or(p.avg_cost)
                })
                .sum::<f64>()
    }

    /// Run the backtest over per-asset candle series (each oldest first).
    pub fn run(&self, data: &BTreeMap<String, Vec<Candle>>) -> BacktestResult {
        let mut timeline: Vec<DateTime<Utc>> = data
            .values()
            .flat_map(|candles| candles.iter().map(|c| c.timestamp))
            .collect();
        timeline.sort();
        timeline.dedup();

        let mut cursors = vec![0usize; data.len()];
        let mut last_price: BTreeMap<String, f64> = BTreeMap::new();
        let mut book = Book {
            positions: PositionStore::new(),
            cash: self.cfg.backtest.initial_capital,
            trades: Vec::new(),
            trade_pnls: Vec::new(),
        };
        let mut equity_curve = Vec::with_capacity(timeline.len());

        for &ts in &timeline {
            let mut analyses: Vec<AssetAnalysis> = Vec::new();
            let mut scores: BTreeMap<String, u32> = BTreeMap::new();

            for (i, (asset_id, candles)) in data.iter().enumerate() {
                let cursor = &mut cursors[i];
                if *cursor >= candles.len() || candles[*cursor].timestamp != ts {
                    continue;
                }
                *cursor += 1;
                let window = &candles[..*cursor];
                last_price.insert(asset_id.clone(), window[window.len() - 1].close);

                let Some(indicators) = IndicatorSet::compute(window, &self.cfg.indicators) else {
                    continue;
                };
                let assessment = regime::classify(window, &self.cfg.regime);
                let score = scorer::score(
                    asset_id,
                    &indicators,
                    &assessment.modifiers,
                    &self.cfg.score,
                );
                scores.insert(asset_id.clone(), score.total_score);
                analyses.push(AssetAnalysis {
                    asset_id: asset_id.clone(),
                    rank: self.cfg.rank_of(asset_id).unwrap_or(i as u32),
                    score,
                    assessment,
                    atr: indicators.atr,
                    bb_middle: indicators.bb_middle,
                    bb_upper: indicators.bb_upper,
                });
            }

            let equity = self.equity(&book, &last_price);
            let decisions =
                arbitrator::arbitrate(&analyses, &book.positions, equity, self.cfg);
            for decision in &decisions {
                self.apply(&mut book, ts, decision);
            }

            // Rebalance: long-held positions with a dead signal get closed.
            let stale: Vec<(String, f64)> = book
                .positions
                .iter()
                .filter(|p| {
                    (ts - p.entry_time).num_days() >= self.cfg.backtest.rebalance_days
                        && scores
                            .get(&p.asset_id)
                            .is_some_and(|&s| s <= self.cfg.backtest.rebalance_exit_score)
                })
                .filter_map(|p| {
                    last_price
                        .get(&p.asset_id)
                        .map(|&price| (p.asset_id.clone(), price))
                })
                .collect();
            for (asset_id, price) in stale {
                if let Some(position) = book.positions.remove(&asset_id) {
                    self.sell(
                        &mut book,
                        ts,
                        &asset_id,
                        TradeKind::Exit,
                        position.quantity,
                        price,
                        position.avg_cost,
                        "rebalance on weak signal",
                    );
                }
            }

            equity_curve.push((ts, self.equity(&book, &last_price)));
        }

        // Force everything closed at the final observed prices.
        if let Some(&final_ts) = timeline.last() {
            let open: Vec<String> = book.positions.iter().map(|p| p.asset_id.clone()).collect();
            for asset_id in open {
                let Some(&price) = last_price.get(&asset_id) else {
                    continue;
                };
                if let Some(position) = book.positions.remove(&asset_id) {
                    self.sell(
                        &mut book,
                        final_ts,
                        &asset_id,
                        TradeKind::Exit,
                        position.quantity,
                        price,
                        position.avg_cost,
                        "end of data",
                    );
                }
            }
            if let Some(last) = equity_curve.last_mut() {
                last.1 = book.cash;
            }
        }

        let equity_values: Vec<f64> = equity_curve.iter().map(|&(_, e)| e).collect();
        let metrics = metrics::compute(
            &equity_values,
            &book.trade_pnls,
            PERIODS_PER_YEAR,
            self.cfg.backtest.risk_free_rate,
        );
        info!(
            trades = book.trades.len(),
            final_equity = book.cash,
            "backtest complete"
        );

        BacktestResult {
            trades: book.trades,
            equity_curve,
            final_equity: book.cash,
            metrics,
        }
    }
}
