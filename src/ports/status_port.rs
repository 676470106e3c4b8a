//! Cycle status publication port trait.
//!
//! The core emits one structured [`CycleStatus`] per cycle; formatting and
//! delivery (chat messages, dashboards) happen outside the core.

use crate::domain::status::CycleStatus;

pub trait StatusSink: Send + Sync {
    fn publish(&self, status: &CycleStatus);
}
