//! Stochastic oscillator (%K / %D).
//!
//! %K = 100 * (close - lowest_low(n)) / (highest_high(n) - lowest_low(n));
//! a flat window (high == low) yields %K = 50. %D is the d-period SMA of %K.
//! Warmup: %K needs (k_period-1) candles, %D needs (k_period+d_period-2).

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_stochastic(
    candles: &[Candle],
    k_period: usize,
    d_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let mut k_values: Vec<Option<f64>> = Vec::with_capacity(candles.len());
    for i in 0..candles.len() {
        if i + 1 < k_period {
            k_values.push(None);
            continue;
        }
        let window = &candles[i + 1 - k_period..=i];
        let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        let k = if range == 0.0 {
            50.0
        } else {
            100.0 * (candles[i].close - lowest) / range
        };
        k_values.push(Some(k));
    }

    let mut values = Vec::with_capacity(candles.len());
    for (i, candle) in candles.iter().enumerate() {
        let d = if i + 1 >= k_period + d_period - 1 {
            let window = &k_values[i + 1 - d_period..=i];
            let sum: f64 = window.iter().map(|k| k.unwrap_or(0.0)).sum();
            Some(sum / d_period as f64)
        } else {
            None
        };

        match (k_values[i], d) {
            (Some(k), Some(d)) => values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Stochastic { k, d },
            }),
            _ => values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Stochastic { k: 0.0, d: 0.0 },
            }),
        }
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{make_candles, make_hlc_candles};

    #[test]
    fn stochastic_warmup() {
        let closes: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        let series = calculate_stochastic(&candles, 5, 3);

        // valid from index k_period + d_period - 2 = 6
        for i in 0..6 {
            assert!(!series.values[i].valid, "index {} should be invalid", i);
        }
        assert!(series.values[6].valid);
        assert!(series.values[7].valid);
    }

    #[test]
    fn stochastic_close_at_high_is_100() {
        let candles = make_hlc_candles(&[
            (10.0, 5.0, 7.0),
            (11.0, 6.0, 8.0),
            (12.0, 7.0, 12.0), // close == highest high of window
        ]);
        let series = calculate_stochastic(&candles, 3, 1);

        let (k, _) = series.stochastic_at(2).unwrap();
        assert!((k - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stochastic_close_at_low_is_0() {
        let candles = make_hlc_candles(&[
            (10.0, 5.0, 7.0),
            (11.0, 6.0, 8.0),
            (12.0, 5.0, 5.0), // close == lowest low
        ]);
        let series = calculate_stochastic(&candles, 3, 1);

        let (k, _) = series.stochastic_at(2).unwrap();
        assert!((k - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stochastic_flat_window_is_50() {
        let candles = make_hlc_candles(&[
            (100.0, 100.0, 100.0),
            (100.0, 100.0, 100.0),
            (100.0, 100.0, 100.0),
        ]);
        let series = calculate_stochastic(&candles, 3, 1);

        let (k, _) = series.stochastic_at(2).unwrap();
        assert!((k - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stochastic_d_is_sma_of_k() {
        let candles = make_hlc_candles(&[
            (10.0, 0.0, 5.0),
            (10.0, 0.0, 2.0),
            (10.0, 0.0, 8.0),
            (10.0, 0.0, 6.0),
        ]);
        let series = calculate_stochastic(&candles, 2, 3);

        // %K values from index 1: 20, 80, 60 (range always 0..10)
        let (_, d) = series.stochastic_at(3).unwrap();
        assert!((d - (20.0 + 80.0 + 60.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn stochastic_zero_period_empty() {
        let candles = make_candles(&[100.0, 101.0]);
        assert!(calculate_stochastic(&candles, 0, 3).values.is_empty());
        assert!(calculate_stochastic(&candles, 14, 0).values.is_empty());
    }

    #[test]
    fn stochastic_in_range() {
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + ((i * 13) % 17) as f64 - 8.0)
            .collect();
        let candles = make_candles(&closes);
        let series = calculate_stochastic(&candles, 14, 3);

        for i in 0..candles.len() {
            if let Some((k, d)) = series.stochastic_at(i) {
                assert!((0.0..=100.0).contains(&k));
                assert!((0.0..=100.0).contains(&d));
            }
        }
    }
}
