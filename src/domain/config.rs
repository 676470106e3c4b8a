//! Typed trading configuration.
//!
//! Raw key/value access goes through [`ConfigPort`]; this module turns it
//! into validated structs once at startup so the rest of the core never
//! touches string lookups. Validation fails fast with the section and key
//! that are wrong.

use crate::domain::error::HelmtraderError;
use crate::domain::regime::Regime;
use crate::ports::config_port::ConfigPort;

/// Indicator periods shared by analysis and backtesting.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub rsi_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub atr_period: usize,
    pub bollinger_period: usize,
    /// Standard deviation multiplier, scaled by 100 (200 = 2.0).
    pub bollinger_mult_x100: u32,
    pub adx_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            ema_fast_period: 10,
            ema_slow_period: 30,
            rsi_period: 14,
            stoch_k_period: 14,
            stoch_d_period: 3,
            atr_period: 14,
            bollinger_period: 20,
            bollinger_mult_x100: 200,
            adx_period: 14,
        }
    }
}

/// Higher-timeframe regime classification thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeConfig {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    /// EMA spread (percent of slow EMA) above which the trend is strong.
    pub strong_spread_pct: f64,
    /// EMA spread below which the market is considered directionless.
    pub neutral_spread_pct: f64,
    pub adx_period: usize,
    /// ADX below this overrides any trend bucket to Ranging.
    pub adx_ranging_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            ema_fast_period: 20,
            ema_slow_period: 50,
            strong_spread_pct: 2.0,
            neutral_spread_pct: 0.5,
            adx_period: 14,
            adx_ranging_threshold: 20.0,
        }
    }
}

/// Signal scoring weights and thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreConfig {
    pub band_weight: u32,
    pub rsi_weight: u32,
    pub stoch_weight: u32,
    pub max_score: u32,
    pub rsi_oversold: f64,
    pub stoch_oversold: f64,
    pub min_entry_score: u32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        ScoreConfig {
            band_weight: 1,
            rsi_weight: 1,
            stoch_weight: 2,
            max_score: 4,
            rsi_oversold: 30.0,
            stoch_oversold: 20.0,
            min_entry_score: 3,
        }
    }
}

/// Position sizing and stop placement.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Hard cap on concurrently open positions.
    pub max_positions: usize,
    /// ATR multiplier for the chandelier stop distance.
    pub chandelier_multiplier: f64,
    /// Fraction of capital committed per entry, in percent.
    pub position_size_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_positions: 5,
            chandelier_multiplier: 3.0,
            position_size_pct: 10.0,
        }
    }
}

/// Add-to-winner (pyramiding) rules.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidConfig {
    pub enabled: bool,
    pub max_entries_per_asset: u32,
    pub min_score: u32,
    pub min_strength: f64,
    /// Minimum unrealized gain over the original entry price, in percent.
    pub min_gain_pct: f64,
    pub allowed_regimes: Vec<Regime>,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        PyramidConfig {
            enabled: true,
            max_entries_per_asset: 3,
            min_score: 4,
            min_strength: 50.0,
            min_gain_pct: 3.0,
            allowed_regimes: vec![Regime::Bullish, Regime::StrongBullish],
        }
    }
}

/// Order submission and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecConfig {
    pub dry_run: bool,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Consecutive failures before an alert is raised.
    pub alert_after: u32,
    pub order_timeout_ms: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            dry_run: true,
            max_attempts: 3,
            backoff_base_ms: 500,
            alert_after: 3,
            order_timeout_ms: 10_000,
        }
    }
}

/// Cycle scheduling and per-asset analysis limits.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Candle interval for scoring, e.g. "1h".
    pub signal_interval: String,
    /// Candle interval for regime classification, e.g. "1d".
    pub regime_interval: String,
    pub candle_limit: usize,
    pub max_concurrency: usize,
    pub task_timeout_ms: u64,
    pub cycle_interval_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            signal_interval: "1h".to_string(),
            regime_interval: "1d".to_string(),
            candle_limit: 200,
            max_concurrency: 4,
            task_timeout_ms: 30_000,
            cycle_interval_secs: 3600,
        }
    }
}

/// Journal file location and retention.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalConfig {
    pub data_dir: String,
    pub snapshot_retention_days: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        JournalConfig {
            data_dir: "data".to_string(),
            snapshot_retention_days: 365,
        }
    }
}

/// Backtest cost model and rebalancing.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    /// Days a position may be held before weak signals force it out.
    pub rebalance_days: i64,
    /// Score at or below which a rebalance check exits the position.
    pub rebalance_exit_score: u32,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            commission_pct: 0.1,
            slippage_pct: 0.05,
            rebalance_days: 20,
            rebalance_exit_score: 1,
            risk_free_rate: 0.02,
        }
    }
}

/// One watchlist entry. Lower rank wins deterministic tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    pub id: String,
    pub rank: u32,
}

/// The whole validated configuration tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradingConfig {
    pub watchlist: Vec<AssetConfig>,
    pub indicators: IndicatorConfig,
    pub regime: RegimeConfig,
    pub score: ScoreConfig,
    pub risk: RiskConfig,
    pub pyramid: PyramidConfig,
    pub exec: ExecConfig,
    pub analysis: AnalysisConfig,
    pub journal: JournalConfig,
    pub backtest: BacktestConfig,
}

fn invalid(section: &str, key: &str, reason: &str) -> HelmtraderError {
    HelmtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn positive_usize(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, HelmtraderError> {
    let raw = port.get_int(section, key, default as i64);
    if raw <= 0 {
        return Err(invalid(section, key, "must be a positive integer"));
    }
    Ok(raw as usize)
}

fn non_negative_f64(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, HelmtraderError> {
    let raw = port.get_double(section, key, default);
    if !raw.is_finite() || raw < 0.0 {
        return Err(invalid(section, key, "must be a non-negative number"));
    }
    Ok(raw)
}

fn positive_f64(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, HelmtraderError> {
    let raw = non_negative_f64(port, section, key, default)?;
    if raw == 0.0 {
        return Err(invalid(section, key, "must be greater than zero"));
    }
    Ok(raw)
}

/// Parse the comma-separated watchlist, assigning ranks from list order.
fn parse_watchlist(raw: &str) -> Result<Vec<AssetConfig>, HelmtraderError> {
    let mut assets = Vec::new();
    for (i, part) in raw.split(',').enumerate() {
        let id = part.trim();
        if id.is_empty() {
            continue;
        }
        if assets.iter().any(|a: &AssetConfig| a.id == id) {
            return Err(invalid("watchlist", "assets", "duplicate asset id"));
        }
        assets.push(AssetConfig {
            id: id.to_string(),
            rank: i as u32,
        });
    }
    if assets.is_empty() {
        return Err(invalid("watchlist", "assets", "watchlist is empty"));
    }
    Ok(assets)
}

fn parse_regime_list(raw: &str) -> Result<Vec<Regime>, HelmtraderError> {
    let mut regimes = Vec::new();
    for part in raw.split(',') {
        let name = part.trim();
        if name.is_empty() {
            continue;
        }
        let regime = match name {
            "strong_bullish" => Regime::StrongBullish,
            "bullish" => Regime::Bullish,
            "neutral" => Regime::Neutral,
            "bearish" => Regime::Bearish,
            "strong_bearish" => Regime::StrongBearish,
            "ranging" => Regime::Ranging,
            _ => return Err(invalid("pyramid", "allowed_regimes", "unknown regime name")),
        };
        if !regimes.contains(&regime) {
            regimes.push(regime);
        }
    }
    Ok(regimes)
}

impl TradingConfig {
    /// Build and validate the full configuration from a raw config source.
    ///
    /// Every key has a default except the watchlist, which is mandatory.
    pub fn from_port(port: &dyn ConfigPort) -> Result<TradingConfig, HelmtraderError> {
        let d = TradingConfig::default();

        let watchlist_raw =
            port.get_string("watchlist", "assets")
                .ok_or_else(|| HelmtraderError::ConfigMissing {
                    section: "watchlist".to_string(),
                    key: "assets".to_string(),
                })?;
        let watchlist = parse_watchlist(&watchlist_raw)?;

        let indicators = IndicatorConfig {
            ema_fast_period: positive_usize(
                port,
                "indicators",
                "ema_fast_period",
                d.indicators.ema_fast_period,
            )?,
            ema_slow_period: positive_usize(
                port,
                "indicators",
                "ema_slow_period",
                d.indicators.ema_slow_period,
            )?,
            rsi_period: positive_usize(port, "indicators", "rsi_period", d.indicators.rsi_period)?,
            stoch_k_period: positive_usize(
                port,
                "indicators",
                "stoch_k_period",
                d.indicators.stoch_k_period,
            )?,
            stoch_d_period: positive_usize(
                port,
                "indicators",
                "stoch_d_period",
                d.indicators.stoch_d_period,
            )?,
            atr_period: positive_usize(port, "indicators", "atr_period", d.indicators.atr_period)?,
            bollinger_period: positive_usize(
                port,
                "indicators",
                "bollinger_period",
                d.indicators.bollinger_period,
            )?,
            bollinger_mult_x100: positive_usize(
                port,
                "indicators",
                "bollinger_mult_x100",
                d.indicators.bollinger_mult_x100 as usize,
            )? as u32,
            adx_period: positive_usize(port, "indicators", "adx_period", d.indicators.adx_period)?,
        };
        if indicators.ema_fast_period >= indicators.ema_slow_period {
            return Err(invalid(
                "indicators",
                "ema_fast_period",
                "fast EMA period must be shorter than slow EMA period",
            ));
        }

        let regime = RegimeConfig {
            ema_fast_period: positive_usize(
                port,
                "regime",
                "ema_fast_period",
                d.regime.ema_fast_period,
            )?,
            ema_slow_period: positive_usize(
                port,
                "regime",
                "ema_slow_period",
                d.regime.ema_slow_period,
            )?,
            strong_spread_pct: positive_f64(
                port,
                "regime",
                "strong_spread_pct",
                d.regime.strong_spread_pct,
            )?,
            neutral_spread_pct: positive_f64(
                port,
                "regime",
                "neutral_spread_pct",
                d.regime.neutral_spread_pct,
            )?,
            adx_period: positive_usize(port, "regime", "adx_period", d.regime.adx_period)?,
            adx_ranging_threshold: non_negative_f64(
                port,
                "regime",
                "adx_ranging_threshold",
                d.regime.adx_ranging_threshold,
            )?,
        };
        if regime.ema_fast_period >= regime.ema_slow_period {
            return Err(invalid(
                "regime",
                "ema_fast_period",
                "fast EMA period must be shorter than slow EMA period",
            ));
        }
        if regime.neutral_spread_pct >= regime.strong_spread_pct {
            return Err(invalid(
                "regime",
                "neutral_spread_pct",
                "neutral spread must be below strong spread",
            ));
        }

        let score = ScoreConfig {
            band_weight: positive_usize(port, "score", "band_weight", d.score.band_weight as usize)?
                as u32,
            rsi_weight: positive_usize(port, "score", "rsi_weight", d.score.rsi_weight as usize)?
                as u32,
            stoch_weight: positive_usize(
                port,
                "score",
                "stoch_weight",
                d.score.stoch_weight as usize,
            )? as u32,
            max_score: positive_usize(port, "score", "max_score", d.score.max_score as usize)?
                as u32,
            rsi_oversold: positive_f64(port, "score", "rsi_oversold", d.score.rsi_oversold)?,
            stoch_oversold: positive_f64(port, "score", "stoch_oversold", d.score.stoch_oversold)?,
            min_entry_score: positive_usize(
                port,
                "score",
                "min_entry_score",
                d.score.min_entry_score as usize,
            )? as u32,
        };
        if score.rsi_oversold >= 100.0 {
            return Err(invalid("score", "rsi_oversold", "must be below 100"));
        }
        if score.min_entry_score > score.max_score {
            return Err(invalid(
                "score",
                "min_entry_score",
                "must not exceed max_score",
            ));
        }

        let risk = RiskConfig {
            max_positions: positive_usize(port, "risk", "max_positions", d.risk.max_positions)?,
            chandelier_multiplier: positive_f64(
                port,
                "risk",
                "chandelier_multiplier",
                d.risk.chandelier_multiplier,
            )?,
            position_size_pct: positive_f64(
                port,
                "risk",
                "position_size_pct",
                d.risk.position_size_pct,
            )?,
        };
        if risk.position_size_pct > 100.0 {
            return Err(invalid("risk", "position_size_pct", "must not exceed 100"));
        }

        let allowed_regimes = match port.get_string("pyramid", "allowed_regimes") {
            Some(raw) => parse_regime_list(&raw)?,
            None => d.pyramid.allowed_regimes.clone(),
        };
        let pyramid = PyramidConfig {
            enabled: port.get_bool("pyramid", "enabled", d.pyramid.enabled),
            max_entries_per_asset: positive_usize(
                port,
                "pyramid",
                "max_entries_per_asset",
                d.pyramid.max_entries_per_asset as usize,
            )? as u32,
            min_score: positive_usize(
                port,
                "pyramid",
                "min_score",
                d.pyramid.min_score as usize,
            )? as u32,
            min_strength: non_negative_f64(
                port,
                "pyramid",
                "min_strength",
                d.pyramid.min_strength,
            )?,
            min_gain_pct: positive_f64(port, "pyramid", "min_gain_pct", d.pyramid.min_gain_pct)?,
            allowed_regimes,
        };

        let exec = ExecConfig {
            dry_run: port.get_bool("execution", "dry_run", d.exec.dry_run),
            max_attempts: positive_usize(
                port,
                "execution",
                "max_attempts",
                d.exec.max_attempts as usize,
            )? as u32,
            backoff_base_ms: positive_usize(
                port,
                "execution",
                "backoff_base_ms",
                d.exec.backoff_base_ms as usize,
            )? as u64,
            alert_after: positive_usize(
                port,
                "execution",
                "alert_after",
                d.exec.alert_after as usize,
            )? as u32,
            order_timeout_ms: positive_usize(
                port,
                "execution",
                "order_timeout_ms",
                d.exec.order_timeout_ms as usize,
            )? as u64,
        };

        let analysis = AnalysisConfig {
            signal_interval: port
                .get_string("analysis", "signal_interval")
                .unwrap_or_else(|| d.analysis.signal_interval.clone()),
            regime_interval: port
                .get_string("analysis", "regime_interval")
                .unwrap_or_else(|| d.analysis.regime_interval.clone()),
            candle_limit: positive_usize(
                port,
                "analysis",
                "candle_limit",
                d.analysis.candle_limit,
            )?,
            max_concurrency: positive_usize(
                port,
                "analysis",
                "max_concurrency",
                d.analysis.max_concurrency,
            )?,
            task_timeout_ms: positive_usize(
                port,
                "analysis",
                "task_timeout_ms",
                d.analysis.task_timeout_ms as usize,
            )? as u64,
            cycle_interval_secs: positive_usize(
                port,
                "analysis",
                "cycle_interval_secs",
                d.analysis.cycle_interval_secs as usize,
            )? as u64,
        };

        let journal = JournalConfig {
            data_dir: port
                .get_string("journal", "data_dir")
                .unwrap_or_else(|| d.journal.data_dir.clone()),
            snapshot_retention_days: positive_usize(
                port,
                "journal",
                "snapshot_retention_days",
                d.journal.snapshot_retention_days,
            )?,
        };

        let backtest = BacktestConfig {
            initial_capital: positive_f64(
                port,
                "backtest",
                "initial_capital",
                d.backtest.initial_capital,
            )?,
            commission_pct: non_negative_f64(
                port,
                "backtest",
                "commission_pct",
                d.backtest.commission_pct,
            )?,
            slippage_pct: non_negative_f64(
                port,
                "backtest",
                "slippage_pct",
                d.backtest.slippage_pct,
            )?,
            rebalance_days: positive_usize(
                port,
                "backtest",
                "rebalance_days",
                d.backtest.rebalance_days as usize,
            )? as i64,
            rebalance_exit_score: port.get_int(
                "backtest",
                "rebalance_exit_score",
                d.backtest.rebalance_exit_score as i64,
            ) as u32,
            risk_free_rate: non_negative_f64(
                port,
                "backtest",
                "risk_free_rate",
                d.backtest.risk_free_rate,
            )?,
        };

        Ok(TradingConfig {
            watchlist,
            indicators,
            regime,
            score,
            risk,
            pyramid,
            exec,
            analysis,
            journal,
            backtest,
        })
    }

    /// Watchlist rank for an asset, used for deterministic tie-breaks.
    pub fn rank_of(&self, asset_id: &str) -> Option<u32> {
        self.watchlist
            .iter()
            .find(|a| a.id == asset_id)
            .map(|a| a.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig {
        values: HashMap<(String, String), String>,
    }

    impl MapConfig {
        fn new(pairs: &[(&str, &str, &str)]) -> Self {
            let values = pairs
                .iter()
                .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                .collect();
            MapConfig { values }
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let port = MapConfig::new(&[("watchlist", "assets", "BTC-USD, ETH-USD")]);
        let config = TradingConfig::from_port(&port).unwrap();

        assert_eq!(config.watchlist.len(), 2);
        assert_eq!(config.watchlist[0].id, "BTC-USD");
        assert_eq!(config.watchlist[0].rank, 0);
        assert_eq!(config.watchlist[1].rank, 1);
        assert_eq!(config.indicators, IndicatorConfig::default());
        assert_eq!(config.risk.max_positions, 5);
        assert!(config.exec.dry_run);
    }

    #[test]
    fn missing_watchlist_fails() {
        let port = MapConfig::new(&[]);
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(err, HelmtraderError::ConfigMissing { .. }));
    }

    #[test]
    fn empty_watchlist_fails() {
        let port = MapConfig::new(&[("watchlist", "assets", " , ,")]);
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(err, HelmtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn duplicate_asset_fails() {
        let port = MapConfig::new(&[("watchlist", "assets", "BTC-USD,BTC-USD")]);
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(err, HelmtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn fast_ema_must_be_shorter_than_slow() {
        let port = MapConfig::new(&[
            ("watchlist", "assets", "BTC-USD"),
            ("indicators", "ema_fast_period", "30"),
            ("indicators", "ema_slow_period", "10"),
        ]);
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(
            err,
            HelmtraderError::ConfigInvalid { ref section, .. } if section == "indicators"
        ));
    }

    #[test]
    fn min_entry_score_above_max_fails() {
        let port = MapConfig::new(&[
            ("watchlist", "assets", "BTC-USD"),
            ("score", "min_entry_score", "9"),
            ("score", "max_score", "5"),
        ]);
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(err, HelmtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn negative_period_fails() {
        let port = MapConfig::new(&[
            ("watchlist", "assets", "BTC-USD"),
            ("indicators", "rsi_period", "-3"),
        ]);
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(err, HelmtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn allowed_regimes_parse() {
        let port = MapConfig::new(&[
            ("watchlist", "assets", "BTC-USD"),
            ("pyramid", "allowed_regimes", "strong_bullish, ranging"),
        ]);
        let config = TradingConfig::from_port(&port).unwrap();
        assert_eq!(
            config.pyramid.allowed_regimes,
            vec![Regime::StrongBullish, Regime::Ranging]
        );
    }

    #[test]
    fn unknown_regime_name_fails() {
        let port = MapConfig::new(&[
            ("watchlist", "assets", "BTC-USD"),
            ("pyramid", "allowed_regimes", "sideways"),
        ]);
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(err, HelmtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn rank_of_finds_watchlist_position() {
        let port = MapConfig::new(&[("watchlist", "assets", "BTC-USD,ETH-USD,SOL-USD")]);
        let config = TradingConfig::from_port(&port).unwrap();
        assert_eq!(config.rank_of("ETH-USD"), Some(1));
        assert_eq!(config.rank_of("DOGE-USD"), None);
    }
}
