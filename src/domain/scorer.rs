//! Entry signal scoring.
//!
//! The score is an integer tally of independently weighted conditions,
//! clamped to `[0, max_score]`. Component contributions are returned with
//! the total so arbitration logs can say why an asset scored what it did.
//! Thresholds come from configuration scaled by the regime modifiers, never
//! from constants here.

use std::collections::BTreeMap;

use crate::domain::config::ScoreConfig;
use crate::domain::indicator::IndicatorSet;
use crate::domain::regime::{EntryMode, StrategyModifiers};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub asset_id: String,
    pub total_score: u32,
    pub contributions: BTreeMap<String, u32>,
    /// Secondary strength metric used for prioritization ties (RSI).
    pub strength: f64,
    pub current_price: f64,
}

/// RSI oversold threshold after regime adjustment. A stricter regime
/// (modifier > 1) lowers the threshold.
pub fn effective_rsi_oversold(cfg: &ScoreConfig, modifiers: &StrategyModifiers) -> f64 {
    cfg.rsi_oversold / modifiers.entry_threshold_modifier
}

/// Minimum entry score after regime adjustment, clamped to valid bounds.
pub fn effective_min_entry_score(cfg: &ScoreConfig, modifiers: &StrategyModifiers) -> u32 {
    let scaled = (cfg.min_entry_score as f64 * modifiers.entry_threshold_modifier).ceil();
    (scaled as u32).min(cfg.max_score)
}

/// Score one asset from its current indicator set.
pub fn score(
    asset_id: &str,
    indicators: &IndicatorSet,
    modifiers: &StrategyModifiers,
    cfg: &ScoreConfig,
) -> ScoreResult {
    let mut contributions = BTreeMap::new();
    let mut total: u32 = 0;

    // The band component is mode-dependent: reversion buys the dip below
    // the lower band, trend buys continuation above an aligned EMA pair.
    let (band_hit, band_label) = match modifiers.entry_mode {
        EntryMode::Reversion => (indicators.close <= indicators.bb_lower, "lower_band"),
        EntryMode::Trend => (
            indicators.close >= indicators.ema_fast && indicators.ema_fast > indicators.ema_slow,
            "trend_continuation",
        ),
    };
    if band_hit {
        contributions.insert(band_label.to_string(), cfg.band_weight);
        total += cfg.band_weight;
    }

    if indicators.rsi < effective_rsi_oversold(cfg, modifiers) {
        contributions.insert("rsi_oversold".to_string(), cfg.rsi_weight);
        total += cfg.rsi_weight;
    }

    // Strictly below-then-above; equal previous values are not a cross.
    let crossed = indicators.prev_stoch_k < indicators.prev_stoch_d
        && indicators.stoch_k > indicators.stoch_d;
    let both_oversold =
        indicators.stoch_k < cfg.stoch_oversold && indicators.stoch_d < cfg.stoch_oversold;
    if crossed && both_oversold {
        contributions.insert("stoch_cross".to_string(), cfg.stoch_weight);
        total += cfg.stoch_weight;
    }

    ScoreResult {
        asset_id: asset_id.to_string(),
        total_score: total.min(cfg.max_score),
        contributions,
        strength: indicators.rsi,
        current_price: indicators.close,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::regime::{Regime, StrategyModifiers};
    use proptest::prelude::*;

    fn neutral_modifiers() -> StrategyModifiers {
        let mut m = StrategyModifiers::for_regime(Regime::Neutral);
        m.entry_threshold_modifier = 1.0;
        m
    }

    fn make_indicators() -> IndicatorSet {
        IndicatorSet {
            close: 100.0,
            prev_close: 101.0,
            ema_fast: 100.0,
            ema_slow: 100.0,
            rsi: 50.0,
            stoch_k: 50.0,
            stoch_d: 50.0,
            prev_stoch_k: 50.0,
            prev_stoch_d: 50.0,
            atr: 5.0,
            bb_upper: 110.0,
            bb_middle: 100.0,
            bb_lower: 90.0,
            adx: 25.0,
        }
    }

    #[test]
    fn quiet_market_scores_zero() {
        let result = score(
            "BTC-USD",
            &make_indicators(),
            &neutral_modifiers(),
            &ScoreConfig::default(),
        );
        assert_eq!(result.total_score, 0);
        assert!(result.contributions.is_empty());
    }

    #[test]
    fn all_components_fire_for_score_four() {
        // RSI 25 vs threshold 30, close at the lower band, stochastic
        // crossing up with both lines under 20.
        let mut ind = make_indicators();
        ind.rsi = 25.0;
        ind.close = 90.0;
        ind.prev_stoch_k = 10.0;
        ind.prev_stoch_d = 12.0;
        ind.stoch_k = 15.0;
        ind.stoch_d = 13.0;

        let result = score(
            "BTC-USD",
            &ind,
            &neutral_modifiers(),
            &ScoreConfig::default(),
        );

        assert_eq!(result.total_score, 4);
        assert_eq!(result.contributions["lower_band"], 1);
        assert_eq!(result.contributions["rsi_oversold"], 1);
        assert_eq!(result.contributions["stoch_cross"], 2);
    }

    #[test]
    fn equal_previous_stochastic_is_not_a_cross() {
        let mut ind = make_indicators();
        ind.prev_stoch_k = 12.0;
        ind.prev_stoch_d = 12.0;
        ind.stoch_k = 15.0;
        ind.stoch_d = 13.0;

        let result = score(
            "BTC-USD",
            &ind,
            &neutral_modifiers(),
            &ScoreConfig::default(),
        );
        assert!(!result.contributions.contains_key("stoch_cross"));
    }

    #[test]
    fn cross_above_oversold_zone_does_not_count() {
        let mut ind = make_indicators();
        ind.prev_stoch_k = 40.0;
        ind.prev_stoch_d = 45.0;
        ind.stoch_k = 50.0;
        ind.stoch_d = 46.0;

        let result = score(
            "BTC-USD",
            &ind,
            &neutral_modifiers(),
            &ScoreConfig::default(),
        );
        assert!(!result.contributions.contains_key("stoch_cross"));
    }

    #[test]
    fn trend_mode_scores_ema_alignment_not_a_band_breach() {
        // StrongBullish carries trend entry mode: the band point comes from
        // price holding above an aligned EMA pair, far from the lower band.
        let mut ind = make_indicators();
        ind.close = 105.0;
        ind.ema_fast = 104.0;
        ind.ema_slow = 100.0;
        ind.bb_lower = 90.0;

        let modifiers = StrategyModifiers::for_regime(Regime::StrongBullish);
        let result = score("BTC-USD", &ind, &modifiers, &ScoreConfig::default());

        assert_eq!(result.contributions["trend_continuation"], 1);
        assert!(!result.contributions.contains_key("lower_band"));
        assert_eq!(result.total_score, 1);
    }

    #[test]
    fn trend_mode_requires_fast_ema_above_slow() {
        let mut ind = make_indicators();
        ind.close = 105.0;
        ind.ema_fast = 104.0;
        ind.ema_slow = 110.0;

        let modifiers = StrategyModifiers::for_regime(Regime::Bullish);
        let result = score("BTC-USD", &ind, &modifiers, &ScoreConfig::default());
        assert!(!result.contributions.contains_key("trend_continuation"));
    }

    #[test]
    fn trend_mode_requires_close_at_or_above_fast_ema() {
        let mut ind = make_indicators();
        ind.close = 103.0;
        ind.ema_fast = 104.0;
        ind.ema_slow = 100.0;

        let modifiers = StrategyModifiers::for_regime(Regime::Bullish);
        let result = score("BTC-USD", &ind, &modifiers, &ScoreConfig::default());
        assert!(!result.contributions.contains_key("trend_continuation"));
    }

    #[test]
    fn reversion_mode_ignores_ema_alignment() {
        let mut ind = make_indicators();
        ind.close = 105.0;
        ind.ema_fast = 104.0;
        ind.ema_slow = 100.0;
        ind.bb_lower = 90.0;

        let result = score(
            "BTC-USD",
            &ind,
            &neutral_modifiers(),
            &ScoreConfig::default(),
        );
        assert!(result.contributions.is_empty());
    }

    #[test]
    fn stricter_regime_lowers_rsi_threshold() {
        let mut ind = make_indicators();
        ind.rsi = 28.0;

        let mut strict = neutral_modifiers();
        strict.entry_threshold_modifier = 1.2;
        let cfg = ScoreConfig::default();

        // 28 < 30 but not < 30/1.2 = 25.
        let relaxed = score("BTC-USD", &ind, &neutral_modifiers(), &cfg);
        let tightened = score("BTC-USD", &ind, &strict, &cfg);

        assert_eq!(relaxed.contributions["rsi_oversold"], 1);
        assert!(!tightened.contributions.contains_key("rsi_oversold"));
    }

    #[test]
    fn effective_min_entry_score_is_clamped() {
        let cfg = ScoreConfig::default();
        let mut strict = neutral_modifiers();
        strict.entry_threshold_modifier = 2.0;
        // ceil(3 * 2.0) = 6, clamped to max_score 4.
        assert_eq!(effective_min_entry_score(&cfg, &strict), 4);

        let mut loose = neutral_modifiers();
        loose.entry_threshold_modifier = 0.9;
        // ceil(3 * 0.9) = 3.
        assert_eq!(effective_min_entry_score(&cfg, &loose), 3);
    }

    #[test]
    fn score_is_clamped_to_max() {
        let mut cfg = ScoreConfig::default();
        cfg.max_score = 2;

        let mut ind = make_indicators();
        ind.rsi = 25.0;
        ind.close = 90.0;
        ind.prev_stoch_k = 10.0;
        ind.prev_stoch_d = 12.0;
        ind.stoch_k = 15.0;
        ind.stoch_d = 13.0;

        let result = score("BTC-USD", &ind, &neutral_modifiers(), &cfg);
        assert_eq!(result.total_score, 2);
    }

    proptest! {
        #[test]
        fn score_stays_in_bounds(
            close in 1.0f64..1000.0,
            rsi in 0.0f64..100.0,
            k in 0.0f64..100.0,
            d in 0.0f64..100.0,
            prev_k in 0.0f64..100.0,
            prev_d in 0.0f64..100.0,
            bb_lower in 1.0f64..1000.0,
        ) {
            let mut ind = make_indicators();
            ind.close = close;
            ind.rsi = rsi;
            ind.stoch_k = k;
            ind.stoch_d = d;
            ind.prev_stoch_k = prev_k;
            ind.prev_stoch_d = prev_d;
            ind.bb_lower = bb_lower;

            let cfg = ScoreConfig::default();
            let result = score("X", &ind, &neutral_modifiers(), &cfg);
            prop_assert!(result.total_score <= cfg.max_score);
        }

        #[test]
        fn adding_a_component_never_lowers_the_total(
            rsi in 0.0f64..100.0,
            close in 1.0f64..1000.0,
        ) {
            let cfg = ScoreConfig::default();
            let modifiers = neutral_modifiers();

            let mut without = make_indicators();
            without.rsi = rsi;
            without.close = close;
            without.bb_lower = 0.5;

            let mut with = without.clone();
            with.bb_lower = with.close;

            let base = score("X", &without, &modifiers, &cfg);
            let boosted = score("X", &with, &modifiers, &cfg);
            prop_assert!(boosted.total_score >= base.total_score);
        }
    }
}
