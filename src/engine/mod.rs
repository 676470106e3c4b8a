//! Live control loop: per-asset analysis, order execution, orchestration.

pub mod analysis;
pub mod executor;
pub mod orchestrator;
