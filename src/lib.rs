//! helmtrader: an automated trading control loop.
//!
//! Hexagonal architecture: decision logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`], and the live cycle
//! driver in [`engine`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod engine;
pub mod cli;
