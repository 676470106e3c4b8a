//! Simple Moving Average indicator.
//!
//! Warmup: first (n-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_sma(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(candles.len());
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        sum += candle.close;
        if i >= period {
            sum -= candles[i - period].close;
        }

        if i + 1 >= period {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(sum / period as f64),
            });
        } else {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_candles;

    #[test]
    fn sma_warmup() {
        let candles = make_candles(&[10.0, 20.0, 30.0, 40.0]);
        let series = calculate_sma(&candles, 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn sma_rolling_window() {
        let candles = make_candles(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_sma(&candles, 3);

        assert!((series.simple_at(2).unwrap() - 20.0).abs() < f64::EPSILON);
        assert!((series.simple_at(3).unwrap() - 30.0).abs() < f64::EPSILON);
        assert!((series.simple_at(4).unwrap() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_period_1_tracks_close() {
        let candles = make_candles(&[10.0, 20.0, 30.0]);
        let series = calculate_sma(&candles, 1);

        assert!((series.simple_at(0).unwrap() - 10.0).abs() < f64::EPSILON);
        assert!((series.simple_at(1).unwrap() - 20.0).abs() < f64::EPSILON);
        assert!((series.simple_at(2).unwrap() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_period_0_empty() {
        let candles = make_candles(&[10.0, 20.0]);
        let series = calculate_sma(&candles, 0);
        assert!(series.values.is_empty());
    }
}
