//! Broker order submission port trait.
//!
//! Adapters own translating the broker's wire responses into the
//! [`ExecError`] taxonomy; retry policy lives in the executor, not here.

use async_trait::async_trait;

use crate::domain::error::ExecError;
use crate::domain::journal::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
}

/// A confirmed fill from the broker.
#[derive(Debug, Clone)]
pub struct BrokerFill {
    pub order_ref: String,
    pub filled_price: f64,
    pub filled_quantity: f64,
}

#[async_trait]
pub trait BrokerPort: Send + Sync {
    async fn submit_order(
        &self,
        asset_id: &str,
        side: Side,
        quantity: f64,
        price: f64,
        order_type: OrderType,
    ) -> Result<BrokerFill, ExecError>;
}
