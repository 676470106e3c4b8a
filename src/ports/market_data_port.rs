//! Market data access port trait.
//!
//! Latency and staleness are the caller's concern; the orchestrator wraps
//! every call in a timeout.

use async_trait::async_trait;

use crate::domain::candle::Candle;
use crate::domain::error::HelmtraderError;

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch up to `limit` most recent candles for `asset_id` at `interval`
    /// (e.g. "1h", "1d"), ordered oldest first.
    async fn get_candles(
        &self,
        asset_id: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, HelmtraderError>;

    /// Latest traded price for `asset_id`.
    async fn get_price(&self, asset_id: &str) -> Result<f64, HelmtraderError>;
}
