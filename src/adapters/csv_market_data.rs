//! CSV file market data adapter.
//!
//! Backed by files named `{asset_id}_{interval}.csv` under a base directory,
//! columns `timestamp,open,high,low,close,volume` with RFC 3339 timestamps,
//! oldest first. Used by backtests and by the live loop when pointed at a
//! local data drop instead of an exchange.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::HelmtraderError;
use crate::ports::market_data_port::MarketDataPort;

pub struct CsvMarketData {
    base_path: PathBuf,
    /// Interval whose latest close serves as the spot price.
    price_interval: String,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf, price_interval: &str) -> Self {
        Self {
            base_path,
            price_interval: price_interval.to_string(),
        }
    }

    fn csv_path(&self, asset_id: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", asset_id, interval))
    }

    fn data_error(asset_id: &str, reason: String) -> HelmtraderError {
        HelmtraderError::MarketData {
            asset_id: asset_id.to_string(),
            reason,
        }
    }

    fn parse_field(
        record: &csv::StringRecord,
        index: usize,
        name: &str,
        asset_id: &str,
    ) -> Result<f64, HelmtraderError> {
        record
            .get(index)
            .ok_or_else(|| Self::data_error(asset_id, format!("missing {} column", name)))?
            .parse()
            .map_err(|e| Self::data_error(asset_id, format!("invalid {} value: {}", name, e)))
    }

    fn load_candles(
        &self,
        asset_id: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, HelmtraderError> {
        let path = self.csv_path(asset_id, interval);
        let content = fs::read_to_string(&path).map_err(|e| {
            Self::data_error(asset_id, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| Self::data_error(asset_id, format!("CSV parse error: {}", e)))?;

            let raw_ts = record
                .get(0)
                .ok_or_else(|| Self::data_error(asset_id, "missing timestamp column".into()))?;
            let timestamp = DateTime::parse_from_rfc3339(raw_ts)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| Self::data_error(asset_id, format!("invalid timestamp: {}", e)))?;

            candles.push(Candle {
                timestamp,
                open: Self::parse_field(&record, 1, "open", asset_id)?,
                high: Self::parse_field(&record, 2, "high", asset_id)?,
                low: Self::parse_field(&record, 3, "low", asset_id)?,
                close: Self::parse_field(&record, 4, "close", asset_id)?,
                volume: Self::parse_field(&record, 5, "volume", asset_id)?,
            });
        }

        // Keep the most recent `limit` rows.
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataPort for CsvMarketData {
    async fn get_candles(
        &self,
        asset_id: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, HelmtraderError> {
        self.load_candles(asset_id, interval, limit)
    }

    async fn get_price(&self, asset_id: &str) -> Result<f64, HelmtraderError> {
        let candles = self.load_candles(asset_id, &self.price_interval, 1)?;
        candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| Self::data_error(asset_id, "no candles available".into()))
    }
}
