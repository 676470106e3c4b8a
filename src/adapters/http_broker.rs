//! HTTP broker adapter.
//!
//! Speaks a JSON order API: the broker answers HTTP 200 with an envelope
//! whose `code` field is "0" on acceptance; any other code is a business
//! rejection even though the transport succeeded. Transport and status
//! failures map onto the executor's error taxonomy; this adapter never
//! retries on its own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::ExecError;
use crate::domain::journal::Side;
use crate::ports::broker_port::{BrokerFill, BrokerPort, OrderType};

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    asset_id: &'a str,
    side: &'a str,
    quantity: f64,
    price: f64,
    order_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<OrderData>,
}

#[derive(Debug, Deserialize)]
struct OrderData {
    order_id: String,
    filled_price: f64,
    filled_quantity: f64,
}

pub struct HttpBroker {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpBroker {
    pub fn new(base_url: &str, api_key: &str, timeout_ms: u64) -> Result<Self, ExecError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ExecError::Connection {
                reason: format!("client build failed: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn map_transport_error(e: reqwest::Error) -> ExecError {
        if e.is_timeout() {
            ExecError::Timeout
        } else {
            ExecError::Connection {
                reason: e.to_string(),
            }
        }
    }
}

fn fill_from_envelope(envelope: OrderEnvelope) -> Result<BrokerFill, ExecError> {
    if envelope.code != "0" {
        return Err(ExecError::Business {
            code: envelope.code,
            message: envelope.msg,
        });
    }
    let data = envelope.data.ok_or_else(|| ExecError::Business {
        code: "0".to_string(),
        message: "accepted order carried no fill data".to_string(),
    })?;
    Ok(BrokerFill {
        order_ref: data.order_id,
        filled_price: data.filled_price,
        filled_quantity: data.filled_quantity,
    })
}

#[async_trait]
impl BrokerPort for HttpBroker {
    async fn submit_order(
        &self,
        asset_id: &str,
        side: Side,
        quantity: f64,
        price: f64,
        order_type: OrderType,
    ) -> Result<BrokerFill, ExecError> {
        let request = OrderRequest {
            asset_id,
            side: match side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            },
            quantity,
            price,
            order_type: match order_type {
                OrderType::Limit => "limit",
                OrderType::Market => "market",
            },
        };

        let url = format!("{}/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ExecError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(Self::map_transport_error)?;
        debug!(asset_id, %body, "broker response");

        let envelope: OrderEnvelope =
            serde_json::from_str(&body).map_err(|e| ExecError::Connection {
                reason: format!("unparseable broker response: {}", e),
            })?;
        fill_from_envelope(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_envelope_yields_a_fill() {
        let envelope: OrderEnvelope = serde_json::from_str(
            r#"{"code":"0","msg":"","data":{"order_id":"ORD-77","filled_price":101.5,"filled_quantity":2.0}}"#,
        )
        .unwrap();

        let fill = fill_from_envelope(envelope).unwrap();
        assert_eq!(fill.order_ref, "ORD-77");
        assert!((fill.filled_price - 101.5).abs() < f64::EPSILON);
    }

    #[test]
    fn nonzero_code_is_a_business_error() {
        let envelope: OrderEnvelope = serde_json::from_str(
            r#"{"code":"51008","msg":"insufficient balance","data":null}"#,
        )
        .unwrap();

        let err = fill_from_envelope(envelope).unwrap_err();
        assert!(matches!(
            err,
            ExecError::Business { ref code, ref message }
                if code == "51008" && message == "insufficient balance"
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn accepted_without_data_is_rejected() {
        let envelope: OrderEnvelope =
            serde_json::from_str(r#"{"code":"0","msg":"","data":null}"#).unwrap();
        assert!(fill_from_envelope(envelope).is_err());
    }

    #[test]
    fn order_request_serializes_expected_fields() {
        let request = OrderRequest {
            asset_id: "BTC-USD",
            side: "buy",
            quantity: 0.5,
            price: 65_000.0,
            order_type: "limit",
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"asset_id\":\"BTC-USD\""));
        assert!(json.contains("\"side\":\"buy\""));
        assert!(json.contains("\"order_type\":\"limit\""));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let broker = HttpBroker::new("https://broker.example/", "key", 5_000).unwrap();
        assert_eq!(broker.base_url, "https://broker.example");
    }
}
