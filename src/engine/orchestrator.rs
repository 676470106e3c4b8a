//! The control loop.
//!
//! Each cycle: analyze every watchlist asset concurrently under a fixed
//! concurrency cap with a per-task timeout, arbitrate single-threaded over
//! the gathered results, execute the decisions sequentially, then persist
//! and publish. A failed cycle is logged and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{error, info, warn};

use crate::domain::arbitrator::{self, AssetAnalysis, Decision, DecisionKind};
use crate::domain::config::TradingConfig;
use crate::domain::error::HelmtraderError;
use crate::domain::journal::{DailySnapshot, PositionSummary, TransactionRecord};
use crate::domain::position::{Position, PositionStore};
use crate::domain::status::{AssetStatus, CycleStatus};
use crate::engine::analysis;
use crate::engine::executor::{ExecutionOutcome, OrderExecutor};
use crate::ports::journal_port::JournalStore;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::status_port::StatusSink;

pub struct Orchestrator {
    market: Arc<dyn MarketDataPort>,
    executor: OrderExecutor,
    journal: Box<dyn JournalStore>,
    status: Box<dyn StatusSink>,
    cfg: Arc<TradingConfig>,
    positions: PositionStore,
    cash: f64,
    /// Cumulative realized profit and loss since the journal began.
    realized_pnl: f64,
    cycle: u64,
}

impl Orchestrator {
    /// Build the orchestrator, restoring positions and cash from the
    /// journal where available.
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        executor: OrderExecutor,
        journal: Box<dyn JournalStore>,
        status: Box<dyn StatusSink>,
        cfg: Arc<TradingConfig>,
    ) -> Result<Self, HelmtraderError> {
        let positions = journal.load_positions()?;
        let today = Utc::now().date_naive();
        let restored = journal.previous_snapshot(today.succ_opt().unwrap_or(today))?;
        let (cash, realized_pnl) = match restored {
            Some(ref snapshot) => (snapshot.cash, snapshot.realized_pnl),
            None => (cfg.backtest.initial_capital, 0.0),
        };
        if let Some(snapshot) = restored {
            info!(
                date = %snapshot.date,
                cash,
                open_positions = positions.open_count(),
                "state restored from journal"
            );
        }
        Ok(Self {
            market,
            executor,
            journal,
            status,
            cfg,
            positions,
            cash,
            realized_pnl,
            cycle: 0,
        })
    }

    async fn gather_analyses(&self) -> Vec<AssetAnalysis> {
        let semaphore = Arc::new(Semaphore::new(self.cfg.analysis.max_concurrency));
        let task_timeout = Duration::from_millis(self.cfg.analysis.task_timeout_ms);

        let mut handles = Vec::with_capacity(self.cfg.watchlist.len());
        for asset in &self.cfg.watchlist {
            let semaphore = semaphore.clone();
            let market = self.market.clone();
            let cfg = self.cfg.clone();
            let asset = asset.clone();
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                let asset_id = asset.id.clone();
                match timeout(task_timeout, analysis::analyze_asset(market, asset, cfg)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(%asset_id, "analysis timed out");
                        None
                    }
                }
            }));
        }

        // Gathered in watchlist order regardless of completion order.
        let mut analyses = Vec::new();
        for handle in handles {
            if let Ok(Some(analysis)) = handle.await {
                analyses.push(analysis);
            }
        }
        analyses
    }

    fn equity(&self, analyses: &[AssetAnalysis]) -> f64 {
        self.cash
            + self
                .positions
                .iter()
                .map(|p| {
                    let price = analyses
                        .iter()
                        .find(|a| a.asset_id == p.asset_id)
                        .map(|a| a.score.current_price)
                        .unwrap_or(p.avg_cost);
                    p.quantity * price
                })
                .sum::<f64>()
    }

    /// Apply a fill to cash and positions. Sells return the realized P&L
    /// and its percentage over cost basis; buys return `None`.
    fn apply_fill(
        &mut self,
        decision: &Decision,
        outcome: &ExecutionOutcome,
    ) -> Option<(f64, f64)> {
        let quantity = outcome.filled_quantity;
        let price = outcome.filled_price;
        match decision.kind {
            DecisionKind::Enter {
                stop_loss_price,
                first_target_price,
                second_target_price,
                ..
            } => {
                self.cash -= quantity * price;
                self.positions.insert(Position::open(
                    &decision.asset_id,
                    price,
                    Utc::now(),
                    quantity,
                    stop_loss_price,
                    first_target_price,
                    second_target_price,
                ));
                None
            }
            DecisionKind::Pyramid {
                stop_loss_price, ..
            } => {
                self.cash -= quantity * price;
                if let Some(position) = self.positions.get_mut(&decision.asset_id) {
                    position.add_entry(price, quantity, stop_loss_price);
                }
                None
            }
            DecisionKind::PartialExit => {
                let position = self.positions.get_mut(&decision.asset_id)?;
                let avg_cost = position.avg_cost;
                let sold = position.take_partial();
                self.cash += sold * price;
                let realized = (price - avg_cost) * sold;
                self.realized_pnl += realized;
                Some((realized, pnl_pct(price, avg_cost)))
            }
            DecisionKind::Exit { .. } => {
                let position = self.positions.remove(&decision.asset_id)?;
                self.cash += position.quantity * price;
                let realized = (price - position.avg_cost) * position.quantity;
                self.realized_pnl += realized;
                Some((realized, pnl_pct(price, position.avg_cost)))
            }
        }
    }

    /// Run one full analyze-arbitrate-execute cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleStatus, HelmtraderError> {
        self.cycle += 1;
        let now = Utc::now();
        info!(cycle = self.cycle, "cycle start");

        let analyses = self.gather_analyses().await;
        let stale_positions: Vec<String> = self
            .positions
            .iter()
            .filter(|p| !analyses.iter().any(|a| a.asset_id == p.asset_id))
            .map(|p| p.asset_id.clone())
            .collect();
        if !stale_positions.is_empty() {
            warn!(
                assets = ?stale_positions,
                "open positions had no analysis this cycle, exit checks skipped"
            );
        }
        let equity = self.equity(&analyses);
        let decisions = arbitrator::arbitrate(&analyses, &self.positions, equity, &self.cfg);
        info!(
            cycle = self.cycle,
            analyzed = analyses.len(),
            decisions = decisions.len(),
            equity,
            "arbitration complete"
        );

        let mut executed = 0usize;
        let mut failed = 0usize;
        for decision in &decisions {
            let outcome = self
                .executor
                .execute(
                    &decision.asset_id,
                    decision.side(),
                    decision.quantity,
                    decision.price,
                )
                .await;
            if !outcome.success {
                failed += 1;
                error!(
                    asset_id = %decision.asset_id,
                    reason = decision.reason_label(),
                    message = %outcome.message,
                    "decision failed to execute"
                );
                continue;
            }
            executed += 1;
            let realized = self.apply_fill(decision, &outcome);
            self.journal.append_transaction(&TransactionRecord {
                timestamp: now,
                date: now.date_naive(),
                asset_id: decision.asset_id.clone(),
                kind: decision.trade_kind(),
                side: decision.side(),
                quantity: outcome.filled_quantity,
                price: outcome.filled_price,
                amount: outcome.filled_quantity * outcome.filled_price,
                order_ref: outcome.order_ref.clone(),
                reason: decision.reason_label().to_string(),
                realized_pnl: realized.map(|(pnl, _)| pnl),
                realized_pnl_pct: realized.map(|(_, pct)| pct),
                dry_run: self.cfg.exec.dry_run,
            })?;
        }

        self.journal.save_positions(&self.positions)?;

        let equity = self.equity(&analyses);
        let positions_summary: Vec<PositionSummary> = self
            .positions
            .iter()
            .map(|p| {
                let price = analyses
                    .iter()
                    .find(|a| a.asset_id == p.asset_id)
                    .map(|a| a.score.current_price)
                    .unwrap_or(p.avg_cost);
                PositionSummary {
                    asset_id: p.asset_id.clone(),
                    quantity: p.quantity,
                    avg_cost: p.avg_cost,
                    current_price: price,
                    unrealized_pnl: p.unrealized_pnl(price),
                }
            })
            .collect();
        let unrealized: f64 = positions_summary.iter().map(|s| s.unrealized_pnl).sum();
        let today = now.date_naive();
        let trades_today = self
            .journal
            .transactions()?
            .iter()
            .filter(|t| t.date == today)
            .count();
        // Daily and cumulative delta fields are derived by the journal
        // store at upsert time.
        self.journal.upsert_snapshot(&DailySnapshot {
            date: today,
            total_assets: equity,
            cash: self.cash,
            invested: equity - self.cash,
            open_positions: self.positions.open_count(),
            realized_pnl: self.realized_pnl,
            unrealized_pnl: unrealized,
            cumulative_pnl: 0.0,
            cumulative_pnl_pct: 0.0,
            daily_pnl: 0.0,
            daily_pnl_pct: 0.0,
            trades_today,
            positions_summary,
        })?;

        let status = CycleStatus {
            timestamp: now,
            cycle: self.cycle,
            assets: analyses
                .iter()
                .map(|a| AssetStatus {
                    asset_id: a.asset_id.clone(),
                    regime: a.assessment.regime,
                    score: a.score.total_score,
                    strength: a.score.strength,
                    price: a.score.current_price,
                })
                .collect(),
            decisions: decisions.len(),
            orders_executed: executed,
            orders_failed: failed,
            open_positions: self.positions.open_count(),
            stale_positions,
            equity,
            consecutive_failures: self.executor.consecutive_failures(),
            alert: self.executor.alert_due(),
        };
        self.status.publish(&status);
        Ok(status)
    }

    /// Run cycles on the configured interval until interrupted.
    pub async fn run(&mut self) -> Result<(), HelmtraderError> {
        let mut interval = tokio::time::interval(Duration::from_secs(
            self.cfg.analysis.cycle_interval_secs,
        ));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.cfg.analysis.cycle_interval_secs,
            assets = self.cfg.watchlist.len(),
            "control loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "cycle failed, continuing");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
            }
        }
        self.journal.save_positions(&self.positions)?;
        Ok(())
    }

    pub fn open_positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }
}

fn pnl_pct(price: f64, avg_cost: f64) -> f64 {
    if avg_cost > 0.0 {
        (price - avg_cost) / avg_cost * 100.0
    } else {
        0.0
    }
}
