//! ADX (Average Directional Index) trend-strength indicator.
//!
//! Wilder's construction: smooth TR and directional movement (+DM/-DM) over
//! n periods, derive DI+ and DI-, then DX = 100·|DI+ − DI-|/(DI+ + DI-),
//! and ADX is the Wilder-smoothed DX. Low ADX means a ranging market.
//! Warmup: first (2n-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_adx(candles: &[Candle], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Adx(period);
    if period == 0 || candles.len() < 2 * period {
        let values: Vec<IndicatorPoint> = candles
            .iter()
            .map(|c| IndicatorPoint {
                timestamp: c.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            })
            .collect();
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let n = candles.len();
    let mut tr = vec![0.0_f64; n];
    let mut plus_dm = vec![0.0_f64; n];
    let mut minus_dm = vec![0.0_f64; n];

    for i in 1..n {
        tr[i] = candles[i].true_range(candles[i - 1].close);
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    // Wilder-smoothed running sums seeded from the first n changes.
    let mut smoothed_tr = tr[1..=period].iter().sum::<f64>();
    let mut smoothed_plus = plus_dm[1..=period].iter().sum::<f64>();
    let mut smoothed_minus = minus_dm[1..=period].iter().sum::<f64>();

    let mut dx = vec![0.0_f64; n];
    for i in period..n {
        if i > period {
            smoothed_tr = smoothed_tr - smoothed_tr / period as f64 + tr[i];
            smoothed_plus = smoothed_plus - smoothed_plus / period as f64 + plus_dm[i];
            smoothed_minus = smoothed_minus - smoothed_minus / period as f64 + minus_dm[i];
        }
        if smoothed_tr == 0.0 {
            dx[i] = 0.0;
            continue;
        }
        let di_plus = 100.0 * smoothed_plus / smoothed_tr;
        let di_minus = 100.0 * smoothed_minus / smoothed_tr;
        let di_sum = di_plus + di_minus;
        dx[i] = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (di_plus - di_minus).abs() / di_sum
        };
    }

    let mut values: Vec<IndicatorPoint> = Vec::with_capacity(n);
    let mut adx = 0.0;
    let first_valid = 2 * period - 1;

    for (i, candle) in candles.iter().enumerate() {
        if i < first_valid {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
        } else if i == first_valid {
            adx = dx[period..=i].iter().sum::<f64>() / period as f64;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(adx),
            });
        } else {
            adx = (adx * (period - 1) as f64 + dx[i]) / period as f64;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(adx),
            });
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
    fn adx_warmup() {
        let hlc: Vec<(f64, f64, f64)> = (0..12)
            .map(|i| {
                let base = 100.0 + i as f64;
                (base + 1.0, base - 1.0, base)
            })
            .collect();
        let candles = make_hlc_candles(&hlc);
        let series = calculate_adx(&candles, 5);

        for i in 0..9 {
            assert!(!series.values[i].valid, "index {} should be invalid", i);
        }
        assert!(series.values[9].valid);
    }

    #[test]
    fn adx_strong_trend_is_high() {
        // Monotone rise: all directional movement is positive.
        let hlc: Vec<(f64, f64, f64)> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                (base + 1.0, base - 1.0, base)
            })
            .collect();
        let candles = make_hlc_candles(&hlc);
        let series = calculate_adx(&candles, 14);

        let adx = series.simple_at(39).unwrap();
        assert!(adx > 50.0, "trending ADX should be high, got {}", adx);
    }

    #[test]
    fn adx_flat_market_is_low() {
        let candles = make_candles(&[100.0; 40]);
        let series = calculate_adx(&candles, 14);

        let adx = series.simple_at(39).unwrap();
        assert!(adx < 5.0, "flat ADX should be near zero, got {}", adx);
    }

    #[test]
    fn adx_in_range() {
        let hlc: Vec<(f64, f64, f64)> = (0..60)
            .map(|i| {
                let base = 100.0 + ((i * 7) % 13) as f64;
                (base + 2.0, base - 2.0, base)
            })
            .collect();
        let candles = make_hlc_candles(&hlc);
        let series = calculate_adx(&candles, 14);

        for i in 0..candles.len() {
            if let Some(adx) = series.simple_at(i) {
                assert!((0.0..=100.0).contains(&adx), "ADX {} out of range", adx);
            }
        }
    }

    #[test]
    fn adx_insufficient_history_invalid() {
        let candles = make_candles(&[100.0, 101.0, 102.0]);
        let series = calculate_adx(&candles, 14);
        assert_eq!(series.values.len(), 3);
        for point in &series.values {
            assert!(!point.valid);
        }
    }
}
