//! Per-asset analysis: candles in, scored assessment out.
//!
//! Failures degrade instead of aborting the cycle: a fetch error yields no
//! analysis at all (so stale exits are not evaluated against a bogus
//! price), while insufficient history yields a neutral no-entry result at
//! the last known price.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::arbitrator::AssetAnalysis;
use crate::domain::config::{AssetConfig, TradingConfig};
use crate::domain::indicator::IndicatorSet;
use crate::domain::regime::{self, Regime, RegimeAssessment, StrategyModifiers};
use crate::domain::scorer::{self, ScoreResult};
use crate::ports::market_data_port::MarketDataPort;

fn neutral_no_entry() -> RegimeAssessment {
    let mut modifiers = StrategyModifiers::for_regime(Regime::Neutral);
    modifiers.allow_entry = false;
    RegimeAssessment {
        regime: Regime::Neutral,
        modifiers,
    }
}

fn degraded(asset: &AssetConfig, price: f64) -> AssetAnalysis {
    AssetAnalysis {
        asset_id: asset.id.clone(),
        rank: asset.rank,
        score: ScoreResult {
            asset_id: asset.id.clone(),
            total_score: 0,
            contributions: Default::default(),
            strength: 0.0,
            current_price: price,
        },
        assessment: neutral_no_entry(),
        atr: 0.0,
        bb_middle: price,
        bb_upper: price,
    }
}

/// Analyze one asset. Returns `None` only when no usable price exists.
pub async fn analyze_asset(
    market: Arc<dyn MarketDataPort>,
    asset: AssetConfig,
    cfg: Arc<TradingConfig>,
) -> Option<AssetAnalysis> {
    let signal_candles = match market
        .get_candles(&asset.id, &cfg.analysis.signal_interval, cfg.analysis.candle_limit)
        .await
    {
        Ok(candles) => candles,
        Err(e) => {
            warn!(asset_id = %asset.id, error = %e, "signal candle fetch failed");
            return None;
        }
    };
    let price = signal_candles.last()?.close;

    let Some(indicators) = IndicatorSet::compute(&signal_candles, &cfg.indicators) else {
        debug!(
            asset_id = %asset.id,
            candles = signal_candles.len(),
            "insufficient history, degrading to neutral"
        );
        return Some(degraded(&asset, price));
    };

    let assessment = match market
        .get_candles(&asset.id, &cfg.analysis.regime_interval, cfg.analysis.candle_limit)
        .await
    {
        Ok(regime_candles) => regime::classify(&regime_candles, &cfg.regime),
        Err(e) => {
            warn!(asset_id = %asset.id, error = %e, "regime candle fetch failed");
            neutral_no_entry()
        }
    };

    let score = scorer::score(&asset.id, &indicators, &assessment.modifiers, &cfg.score);
    debug!(
        asset_id = %asset.id,
        regime = ?assessment.regime,
        score = score.total_score,
        strength = score.strength,
        "asset analyzed"
    );

    Some(AssetAnalysis {
        asset_id: asset.id.clone(),
        rank: asset.rank,
        score,
        assessment,
        atr: indicators.atr,
        bb_middle: indicators.bb_middle,
        bb_upper: indicators.bb_upper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Candle;
    use crate::domain::error::HelmtraderError;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    struct FixedMarket {
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl MarketDataPort for FixedMarket {
        async fn get_candles(
            &self,
            _asset_id: &str,
            _interval: &str,
            limit: usize,
        ) -> Result<Vec<Candle>, HelmtraderError> {
            let start = self.candles.len().saturating_sub(limit);
            Ok(self.candles[start..].to_vec())
        }

        async fn get_price(&self, asset_id: &str) -> Result<f64, HelmtraderError> {
            self.candles.last().map(|c| c.close).ok_or_else(|| {
                HelmtraderError::MarketData {
                    asset_id: asset_id.to_string(),
                    reason: "empty".to_string(),
                }
            })
        }
    }

    struct BrokenMarket;

    #[async_trait]
    impl MarketDataPort for BrokenMarket {
        async fn get_candles(
            &self,
            asset_id: &str,
            _interval: &str,
            _limit: usize,
        ) -> Result<Vec<Candle>, HelmtraderError> {
            Err(HelmtraderError::MarketData {
                asset_id: asset_id.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn get_price(&self, asset_id: &str) -> Result<f64, HelmtraderError> {
            Err(HelmtraderError::MarketData {
                asset_id: asset_id.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    fn make_candles(count: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle {
                    timestamp: start + Duration::hours(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    fn asset() -> AssetConfig {
        AssetConfig {
            id: "BTC-USD".to_string(),
            rank: 0,
        }
    }

    #[tokio::test]
    async fn full_history_produces_a_scored_analysis() {
        let market = Arc::new(FixedMarket {
            candles: make_candles(200),
        });
        let cfg = Arc::new(TradingConfig::default());

        let analysis = analyze_asset(market, asset(), cfg).await.unwrap();

        assert_eq!(analysis.asset_id, "BTC-USD");
        assert!(analysis.atr > 0.0);
        assert!(analysis.score.current_price > 0.0);
    }

    #[tokio::test]
    async fn short_history_degrades_to_neutral_no_entry() {
        let market = Arc::new(FixedMarket {
            candles: make_candles(5),
        });
        let cfg = Arc::new(TradingConfig::default());

        let analysis = analyze_asset(market, asset(), cfg).await.unwrap();

        assert_eq!(analysis.score.total_score, 0);
        assert_eq!(analysis.assessment.regime, Regime::Neutral);
        assert!(!analysis.assessment.modifiers.allow_entry);
        // Exit checks still have a real price to work with.
        assert!((analysis.score.current_price - 104.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn fetch_failure_yields_no_analysis() {
        let market = Arc::new(BrokenMarket);
        let cfg = Arc::new(TradingConfig::default());

        assert!(analyze_asset(market, asset(), cfg).await.is_none());
    }

    #[tokio::test]
    async fn empty_candles_yield_no_analysis() {
        let market = Arc::new(FixedMarket { candles: vec![] });
        let cfg = Arc::new(TradingConfig::default());

        assert!(analyze_asset(market, asset(), cfg).await.is_none());
    }
}
