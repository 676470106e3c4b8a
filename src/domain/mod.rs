//! Core domain types and decision logic.

pub mod candle;
pub mod indicator;
pub mod regime;
pub mod scorer;
pub mod position;
pub mod arbitrator;
pub mod config;
pub mod journal;
pub mod backtest;
pub mod metrics;
pub mod status;
pub mod error;
