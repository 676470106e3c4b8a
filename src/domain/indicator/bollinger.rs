//! Bollinger Bands indicator.
//!
//! - Middle: SMA over n periods
//! - Upper/Lower: middle ± multiplier × population standard deviation
//!
//! The multiplier is carried as an integer ×100 so the band parameters stay
//! hashable. Warmup: first (period-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, sma};

pub fn calculate_bollinger(
    candles: &[Candle],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    if period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let middle_band = sma::calculate_sma(candles, period);
    let mut values = Vec::with_capacity(candles.len());
    let mult = stddev_mult_x100 as f64 / 100.0;

    for i in 0..candles.len() {
        let (valid, upper, middle, lower) = match middle_band.simple_at(i) {
            Some(middle) => {
                let window = &candles[i + 1 - period..=i];
                let variance: f64 = window
                    .iter()
                    .map(|c| {
                        let diff = c.close - middle;
                        diff * diff
                    })
                    .sum::<f64>()
                    / period as f64;
                let stddev = variance.sqrt();
                (true, middle + mult * stddev, middle, middle - mult * stddev)
            }
            None => (false, 0.0, 0.0, 0.0),
        };

        values.push(IndicatorPoint {
            timestamp: candles[i].timestamp,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
