//! Adapter implementations of the port traits.

pub mod csv_market_data;
pub mod file_config_adapter;
pub mod file_journal;
pub mod http_broker;
pub mod log_status;
