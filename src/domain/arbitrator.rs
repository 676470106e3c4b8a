//! Portfolio arbitration.
//!
//! Turns per-asset analysis results plus the current position store into an
//! ordered list of decisions. Exits always come first and ignore slot
//! limits; entries and pyramids follow in priority order, with new entries
//! gated by the portfolio slot cap. The output is a total order: identical
//! inputs always produce the identical decision list.

use tracing::debug;

use crate::domain::config::TradingConfig;
use crate::domain::journal::{Side, TradeKind};
use crate::domain::position::PositionStore;
use crate::domain::regime::{RegimeAssessment, TakeProfitTarget};
use crate::domain::scorer::{self, ScoreResult};

/// Why a position is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    SecondTarget,
    Rebalance,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionKind {
    Enter {
        score: u32,
        stop_loss_price: f64,
        first_target_price: f64,
        second_target_price: f64,
    },
    Pyramid {
        score: u32,
        /// Which entry this will be (2 = first add).
        entry_number: u32,
        stop_loss_price: f64,
    },
    /// Sell half at the first target and move the stop to breakeven.
    PartialExit,
    Exit {
        reason: ExitReason,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub asset_id: String,
    pub quantity: f64,
    pub price: f64,
    pub kind: DecisionKind,
}

impl Decision {
    pub fn side(&self) -> Side {
        match self.kind {
            DecisionKind::Enter { .. } | DecisionKind::Pyramid { .. } => Side::Buy,
            DecisionKind::PartialExit | DecisionKind::Exit { .. } => Side::Sell,
        }
    }

    pub fn trade_kind(&self) -> TradeKind {
        match self.kind {
            DecisionKind::Enter { .. } => TradeKind::Entry,
            DecisionKind::Pyramid { .. } => TradeKind::Pyramid,
            DecisionKind::PartialExit => TradeKind::PartialExit,
            DecisionKind::Exit { .. } => TradeKind::Exit,
        }
    }

    pub fn reason_label(&self) -> &'static str {
        match self.kind {
            DecisionKind::Enter { .. } => "entry signal",
            DecisionKind::Pyramid { .. } => "pyramid signal",
            DecisionKind::PartialExit => "first target reached",
            DecisionKind::Exit { reason } => match reason {
                ExitReason::StopLoss => "stop loss breached",
                ExitReason::SecondTarget => "second target reached",
                ExitReason::Rebalance => "rebalance on weak signal",
                ExitReason::EndOfData => "end of data",
            },
        }
    }
}

/// One asset's analysis output for the cycle.
#[derive(Debug, Clone)]
pub struct AssetAnalysis {
    pub asset_id: String,
    /// Watchlist tie-break rank; lower wins.
    pub rank: u32,
    pub score: ScoreResult,
    pub assessment: RegimeAssessment,
    pub atr: f64,
    pub bb_middle: f64,
    pub bb_upper: f64,
}

enum Candidate<'a> {
    New(&'a AssetAnalysis),
    Pyramid {
        analysis: &'a AssetAnalysis,
        entry_number: u32,
    },
}

impl Candidate<'_> {
    fn analysis(&self) -> &AssetAnalysis {
        match self {
            Candidate::New(a) => a,
            Candidate::Pyramid { analysis, .. } => analysis,
        }
    }
}

/// Chandelier stop and the two profit targets for an entry at `price`.
fn entry_levels(
    price: f64,
    analysis: &AssetAnalysis,
    cfg: &TradingConfig,
) -> (f64, f64, f64) {
    let modifiers = &analysis.assessment.modifiers;
    let stop = price - analysis.atr * cfg.risk.chandelier_multiplier * modifiers.stop_loss_modifier;

    let mut final_target = match modifiers.take_profit_target {
        TakeProfitTarget::MidBand => analysis.bb_middle,
        TakeProfitTarget::UpperBand => analysis.bb_upper,
    };
    // A band at or below the entry is no target; fall back to one
    // risk-distance above the entry.
    if final_target <= price {
        final_target = price + (price - stop);
    }
    let first_target = (price + final_target) / 2.0;
    (stop, first_target, final_target)
}

fn entry_quantity(equity: f64, price: f64, cfg: &TradingConfig) -> f64 {
    if price <= 0.0 {
        return 0.0;
    }
    equity * cfg.risk.position_size_pct / 100.0 / price
}

fn pyramid_eligible(
    analysis: &AssetAnalysis,
    positions: &PositionStore,
    cfg: &TradingConfig,
) -> Option<u32> {
    if !cfg.pyramid.enabled {
        return None;
    }
    let position = positions.get(&analysis.asset_id)?;
    if position.entry_count >= cfg.pyramid.max_entries_per_asset {
        return None;
    }
    if analysis.score.total_score < cfg.pyramid.min_score {
        return None;
    }
    if analysis.score.strength < cfg.pyramid.min_strength {
        return None;
    }
    // Gain is measured from the original entry price, not the latest fill.
    if position.gain_pct(analysis.score.current_price) < cfg.pyramid.min_gain_pct {
        return None;
    }
    if !cfg
        .pyramid
        .allowed_regimes
        .contains(&analysis.assessment.regime)
    {
        return None;
    }
    Some(position.entry_count + 1)
}

/// Produce the cycle's decision list: exits first, then slot-gated entries
/// and pyramids in priority order.
pub fn arbitrate(
    analyses: &[AssetAnalysis],
    positions: &PositionStore,
    equity: f64,
    cfg: &TradingConfig,
) -> Vec<Decision> {
    let mut decisions = Vec::new();
    // Assets with any exit activity this cycle; they take no new entries.
    let mut exiting: Vec<&str> = Vec::new();
    let mut freed_slots = 0usize;

    // Exit pass runs over positions in asset order, ignoring slot limits.
    for position in positions.iter() {
        let Some(analysis) = analyses.iter().find(|a| a.asset_id == position.asset_id) else {
            continue;
        };
        let price = analysis.score.current_price;

        if price <= position.stop_loss_price {
            decisions.push(Decision {
                asset_id: position.asset_id.clone(),
                quantity: position.quantity,
                price,
                kind: DecisionKind::Exit {
                    reason: ExitReason::StopLoss,
                },
            });
            exiting.push(position.asset_id.as_str());
            freed_slots += 1;
        } else if !position.first_target_hit && price >= position.first_target_price {
            decisions.push(Decision {
                asset_id: position.asset_id.clone(),
                quantity: position.quantity / 2.0,
                price,
                kind: DecisionKind::PartialExit,
            });
            exiting.push(position.asset_id.as_str());
        } else if position.first_target_hit && price >= position.second_target_price {
            decisions.push(Decision {
                asset_id: position.asset_id.clone(),
                quantity: position.quantity,
                price,
                kind: DecisionKind::Exit {
                    reason: ExitReason::SecondTarget,
                },
            });
            exiting.push(position.asset_id.as_str());
            freed_slots += 1;
        }
    }

    // Entry candidate pass.
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    for analysis in analyses {
        if exiting.contains(&analysis.asset_id.as_str()) {
            continue;
        }
        let modifiers = &analysis.assessment.modifiers;
        let minimum = scorer::effective_min_entry_score(&cfg.score, modifiers);
        if analysis.score.total_score < minimum {
            continue;
        }
        if positions.get(&analysis.asset_id).is_none() {
            if modifiers.allow_entry {
                candidates.push(Candidate::New(analysis));
            }
        } else if let Some(entry_number) = pyramid_eligible(analysis, positions, cfg) {
            candidates.push(Candidate::Pyramid {
                analysis,
                entry_number,
            });
        }
    }

    // Total order: score desc, strength desc, rank asc, asset id asc.
    candidates.sort_by(|a, b| {
        let (a, b) = (a.analysis(), b.analysis());
        b.score
            .total_score
            .cmp(&a.score.total_score)
            .then(b.score.strength.total_cmp(&a.score.strength))
            .then(a.rank.cmp(&b.rank))
            .then(a.asset_id.cmp(&b.asset_id))
    });

    // Slot gating: fully exited positions free their slots for this cycle's
    // bookkeeping.
    let mut open_slots = positions.open_count().saturating_sub(freed_slots);
    for candidate in candidates {
        match candidate {
            Candidate::New(analysis) => {
                if open_slots >= cfg.risk.max_positions {
                    debug!(
                        asset_id = %analysis.asset_id,
                        score = analysis.score.total_score,
                        "entry skipped, no free position slots"
                    );
                    continue;
                }
                let price = analysis.score.current_price;
                let quantity = entry_quantity(equity, price, cfg);
                if quantity <= 0.0 {
                    continue;
                }
                let (stop, first, second) = entry_levels(price, analysis, cfg);
                decisions.push(Decision {
                    asset_id: analysis.asset_id.clone(),
                    quantity,
                    price,
                    kind: DecisionKind::Enter {
                        score: analysis.score.total_score,
                        stop_loss_price: stop,
                        first_target_price: first,
                        second_target_price: second,
                    },
                });
                open_slots += 1;
            }
            Candidate::Pyramid {
                analysis,
                entry_number,
            } => {
                let price = analysis.score.current_price;
                let quantity = entry_quantity(equity, price, cfg);
                if quantity <= 0.0 {
                    continue;
                }
                let modifiers = &analysis.assessment.modifiers;
                let stop = price
                    - analysis.atr * cfg.risk.chandelier_multiplier * modifiers.stop_loss_modifier;
                decisions.push(Decision {
                    asset_id: analysis.asset_id.clone(),
                    quantity,
                    price,
                    kind: DecisionKind::Pyramid {
                        score: analysis.score.total_score,
                        entry_number,
                        stop_loss_price: stop,
                    },
                });
            }
        }
    }

    decisions
}
