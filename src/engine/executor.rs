//! Order execution with retry.
//!
//! Validation happens before any network call. Retryable failures (timeout,
//! connection, 429, 5xx) back off exponentially up to the attempt cap;
//! business rejections and other 4xx fail immediately. A consecutive-failure
//! counter survives across cycles so the orchestrator can alert after N
//! failures in a row without retrying more aggressively.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::config::ExecConfig;
use crate::domain::error::ExecError;
use crate::domain::journal::Side;
use crate::ports::broker_port::{BrokerPort, OrderType};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub order_ref: String,
    pub filled_price: f64,
    pub filled_quantity: f64,
    pub message: String,
}

pub struct OrderExecutor {
    broker: Arc<dyn BrokerPort>,
    cfg: ExecConfig,
    consecutive_failures: u32,
    sim_counter: u64,
}

impl OrderExecutor {
    pub fn new(broker: Arc<dyn BrokerPort>, cfg: ExecConfig) -> Self {
        Self {
            broker,
            cfg,
            consecutive_failures: 0,
            sim_counter: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True once failures have reached the alert threshold.
    pub fn alert_due(&self) -> bool {
        self.consecutive_failures >= self.cfg.alert_after
    }

    fn validate(asset_id: &str, quantity: f64, price: f64) -> Result<(), ExecError> {
        if asset_id.is_empty() {
            return Err(ExecError::Validation {
                reason: "empty asset id".to_string(),
            });
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ExecError::Validation {
                reason: format!("non-positive quantity {}", quantity),
            });
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(ExecError::Validation {
                reason: format!("non-positive price {}", price),
            });
        }
        Ok(())
    }

    fn failure(&mut self, message: String) -> ExecutionOutcome {
        self.consecutive_failures += 1;
        if self.alert_due() {
            warn!(
                consecutive_failures = self.consecutive_failures,
                "execution failing repeatedly"
            );
        }
        ExecutionOutcome {
            success: false,
            order_ref: String::new(),
            filled_price: 0.0,
            filled_quantity: 0.0,
            message,
        }
    }

    pub async fn execute(
        &mut self,
        asset_id: &str,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> ExecutionOutcome {
        if let Err(e) = Self::validate(asset_id, quantity, price) {
            return self.failure(e.to_string());
        }

        if self.cfg.dry_run {
            self.sim_counter += 1;
            self.consecutive_failures = 0;
            let order_ref = format!("SIM-{}-{}", Utc::now().timestamp_millis(), self.sim_counter);
            info!(asset_id, ?side, quantity, price, %order_ref, "dry-run fill");
            return ExecutionOutcome {
                success: true,
                order_ref,
                filled_price: price,
                filled_quantity: quantity,
                message: "simulated fill".to_string(),
            };
        }

        let mut backoff = Duration::from_millis(self.cfg.backoff_base_ms);
        let mut last_error: Option<ExecError> = None;

        for attempt in 1..=self.cfg.max_attempts {
            match self
                .broker
                .submit_order(asset_id, side, quantity, price, OrderType::Limit)
                .await
            {
                Ok(fill) => {
                    self.consecutive_failures = 0;
                    info!(
                        asset_id,
                        ?side,
                        order_ref = %fill.order_ref,
                        filled_price = fill.filled_price,
                        "order filled"
                    );
                    return ExecutionOutcome {
                        success: true,
                        order_ref: fill.order_ref,
                        filled_price: fill.filled_price,
                        filled_quantity: fill.filled_quantity,
                        message: "filled".to_string(),
                    };
                }
                Err(e) => {
                    let retryable = e.is_retryable() && attempt < self.cfg.max_attempts;
                    warn!(asset_id, attempt, error = %e, retryable, "order attempt failed");
                    if !retryable {
                        return self.failure(e.to_string());
                    }
                    last_error = Some(e);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }

        // Only reachable if max_attempts is zero after validation guards.
        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        self.failure(message)
    }
}
