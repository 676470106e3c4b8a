//! Technical indicator implementations.
//!
//! Series-level calculations produce an [`IndicatorSeries`] of
//! [`IndicatorPoint`]s with warmup `valid` flags. [`IndicatorSet`] is the
//! per-cycle snapshot the scorer consumes: the latest (and, where crossover
//! detection needs it, previous) value of every enabled indicator family.

pub mod sma;
pub mod ema;
pub mod rsi;
pub mod atr;
pub mod stochastic;
pub mod bollinger;
pub mod adx;

use chrono::{DateTime, Utc};
use std::fmt;

use crate::domain::candle::Candle;
use crate::domain::config::IndicatorConfig;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// The simple value at index `i`, if present and past warmup.
    pub fn simple_at(&self, i: usize) -> Option<f64> {
        match self.values.get(i) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// The stochastic (%K, %D) pair at index `i`, if valid.
    pub fn stochastic_at(&self, i: usize) -> Option<(f64, f64)> {
        match self.values.get(i) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Stochastic { k, d },
                ..
            }) => Some((*k, *d)),
            _ => None,
        }
    }

    /// The Bollinger (upper, middle, lower) triple at index `i`, if valid.
    pub fn bollinger_at(&self, i: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(i) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
                ..
            }) => Some((*upper, *middle, *lower)),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// Latest indicator values for one asset, recomputed each analysis cycle
/// from the trailing candle window.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub close: f64,
    pub prev_close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub prev_stoch_k: f64,
    pub prev_stoch_d: f64,
    pub atr: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub adx: f64,
}

impl IndicatorSet {
    /// Compute the snapshot for the final candle of `candles`.
    ///
    /// Returns `None` when any required indicator is still in warmup at the
    /// last index (or the previous one, for the stochastic crossover).
    pub fn compute(candles: &[Candle], cfg: &IndicatorConfig) -> Option<IndicatorSet> {
        if candles.len() < 2 {
            return None;
        }
        let last = candles.len() - 1;
        let prev = last - 1;

        let ema_fast = ema::calculate_ema(candles, cfg.ema_fast_period).simple_at(last)?;
        let ema_slow = ema::calculate_ema(candles, cfg.ema_slow_period).simple_at(last)?;
        let rsi = rsi::calculate_rsi(candles, cfg.rsi_period).simple_at(last)?;
        let atr = atr::calculate_atr(candles, cfg.atr_period).simple_at(last)?;
        let adx = adx::calculate_adx(candles, cfg.adx_period).simple_at(last)?;

        let stoch =
            stochastic::calculate_stochastic(candles, cfg.stoch_k_period, cfg.stoch_d_period);
        let (stoch_k, stoch_d) = stoch.stochastic_at(last)?;
        let (prev_stoch_k, prev_stoch_d) = stoch.stochastic_at(prev)?;

        let (bb_upper, bb_middle, bb_lower) = bollinger::calculate_bollinger(
            candles,
            cfg.bollinger_period,
            cfg.bollinger_mult_x100,
        )
        .bollinger_at(last)?;

        Some(IndicatorSet {
            close: candles[last].close,
            prev_close: candles[prev].close,
            ema_fast,
            ema_slow,
            rsi,
            stoch_k,
            stoch_d,
            prev_stoch_k,
            prev_stoch_d,
            atr,
            bb_upper,
            bb_middle,
            bb_lower,
            adx,
        })
    }
}
