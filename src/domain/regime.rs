//! Market regime classification and strategy modifiers.
//!
//! Regime is a pure function of a higher-timeframe candle window: the
//! EMA-fast/EMA-slow spread picks the trend bucket, and a low ADX overrides
//! to `Ranging`. The classifier carries no state beyond the last emitted
//! regime, kept only so callers can detect changes.

use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;
use crate::domain::config::RegimeConfig;
use crate::domain::indicator::{adx, ema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TakeProfitTarget {
    MidBand,
    UpperBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryMode {
    Trend,
    Reversion,
}

/// How the current regime bends the entry/exit rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyModifiers {
    /// Multiplier on the minimum entry score (>1 = stricter) and divisor on
    /// the RSI oversold threshold.
    pub entry_threshold_modifier: f64,
    /// Multiplier on the chandelier stop distance.
    pub stop_loss_modifier: f64,
    pub take_profit_target: TakeProfitTarget,
    pub entry_mode: EntryMode,
    pub allow_entry: bool,
}

impl StrategyModifiers {
    pub fn for_regime(regime: Regime) -> StrategyModifiers {
        match regime {
            Regime::StrongBullish => StrategyModifiers {
                entry_threshold_modifier: 0.9,
                stop_loss_modifier: 1.2,
                take_profit_target: TakeProfitTarget::UpperBand,
                entry_mode: EntryMode::Trend,
                allow_entry: true,
            },
            Regime::Bullish => StrategyModifiers {
                entry_threshold_modifier: 1.0,
                stop_loss_modifier: 1.0,
                take_profit_target: TakeProfitTarget::UpperBand,
                entry_mode: EntryMode::Trend,
                allow_entry: true,
            },
            Regime::Neutral => StrategyModifiers {
                entry_threshold_modifier: 1.1,
                stop_loss_modifier: 1.0,
                take_profit_target: TakeProfitTarget::MidBand,
                entry_mode: EntryMode::Reversion,
                allow_entry: true,
            },
            Regime::Ranging => StrategyModifiers {
                entry_threshold_modifier: 1.2,
                stop_loss_modifier: 0.8,
                take_profit_target: TakeProfitTarget::MidBand,
                entry_mode: EntryMode::Reversion,
                allow_entry: true,
            },
            Regime::Bearish => StrategyModifiers {
                entry_threshold_modifier: 1.3,
                stop_loss_modifier: 0.8,
                take_profit_target: TakeProfitTarget::MidBand,
                entry_mode: EntryMode::Reversion,
                allow_entry: true,
            },
            Regime::StrongBearish => StrategyModifiers {
                entry_threshold_modifier: 1.5,
                stop_loss_modifier: 0.8,
                take_profit_target: TakeProfitTarget::MidBand,
                entry_mode: EntryMode::Reversion,
                allow_entry: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeAssessment {
    pub regime: Regime,
    pub modifiers: StrategyModifiers,
}

/// Classify the regime from a higher-timeframe window.
///
/// Insufficient history (EMA-slow or ADX still in warmup) yields `Neutral`
/// with entries disabled; it never errors.
pub fn classify(window: &[Candle], cfg: &RegimeConfig) -> RegimeAssessment {
    let last = match window.len().checked_sub(1) {
        Some(i) => i,
        None => return no_history(),
    };

    let fast = ema::calculate_ema(window, cfg.ema_fast_period).simple_at(last);
    let slow = ema::calculate_ema(window, cfg.ema_slow_period).simple_at(last);
    let adx_value = adx::calculate_adx(window, cfg.adx_period).simple_at(last);

    let (fast, slow, adx_value) = match (fast, slow, adx_value) {
        (Some(f), Some(s), Some(a)) if s > 0.0 => (f, s, a),
        _ => return no_history(),
    };

    let spread_pct = (fast - slow) / slow * 100.0;

    let regime = if adx_value < cfg.adx_ranging_threshold {
        Regime::Ranging
    } else if spread_pct > cfg.strong_spread_pct {
        Regime::StrongBullish
    } else if spread_pct > cfg.neutral_spread_pct {
        Regime::Bullish
    } else if spread_pct < -cfg.strong_spread_pct {
        Regime::StrongBearish
    } else if spread_pct < -cfg.neutral_spread_pct {
        Regime::Bearish
    } else {
        Regime::Neutral
    };

    RegimeAssessment {
        regime,
        modifiers: StrategyModifiers::for_regime(regime),
    }
}

fn no_history() -> RegimeAssessment {
    let mut modifiers = StrategyModifiers::for_regime(Regime::Neutral);
    modifiers.allow_entry = false;
    RegimeAssessment {
        regime: Regime::Neutral,
        modifiers,
    }
}

/// Remembers the last emitted regime so change events can be surfaced.
#[derive(Debug, Default)]
pub struct RegimeClassifier {
    last: Option<Regime>,
}

impl RegimeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `window` and report whether the regime changed since the
    /// previous call.
    pub fn assess(&mut self, window: &[Candle], cfg: &RegimeConfig) -> (RegimeAssessment, bool) {
        let assessment = classify(window, cfg);
        let changed = self.last.is_some_and(|prev| prev != assessment.regime);
        self.last = Some(assessment.regime);
        (assessment, changed)
    }
}
