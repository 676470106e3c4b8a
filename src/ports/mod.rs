//! Port traits for external collaborators.

pub mod broker_port;
pub mod config_port;
pub mod journal_port;
pub mod market_data_port;
pub mod status_port;
