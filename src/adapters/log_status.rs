//! Status sink that writes cycle summaries to the log.

use tracing::{info, warn};

use crate::domain::status::CycleStatus;
use crate::ports::status_port::StatusSink;

pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&self, status: &CycleStatus) {
        let detail = serde_json::to_string(status).unwrap_or_else(|_| "<unserializable>".into());
        if status.alert {
            warn!(
                cycle = status.cycle,
                consecutive_failures = status.consecutive_failures,
                %detail,
                "cycle complete with execution alert"
            );
        } else {
            info!(
                cycle = status.cycle,
                decisions = status.decisions,
                executed = status.orders_executed,
                open_positions = status.open_positions,
                equity = status.equity,
                %detail,
                "cycle complete"
            );
        }
    }
}
