//! Journal persistence port trait.
//!
//! Implementations must be crash-safe: a partially written file must never
//! replace a previously good one.

use chrono::NaiveDate;

use crate::domain::error::HelmtraderError;
use crate::domain::journal::{DailySnapshot, TransactionRecord};
use crate::domain::position::PositionStore;

pub trait JournalStore: Send + Sync {
    /// Append one transaction to the durable log.
    fn append_transaction(&self, record: &TransactionRecord) -> Result<(), HelmtraderError>;

    /// Insert or replace the snapshot for its date.
    fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> Result<(), HelmtraderError>;

    /// Most recent snapshot strictly before `date`, if any.
    fn previous_snapshot(&self, date: NaiveDate)
    -> Result<Option<DailySnapshot>, HelmtraderError>;

    /// All transactions, oldest first.
    fn transactions(&self) -> Result<Vec<TransactionRecord>, HelmtraderError>;

    fn load_positions(&self) -> Result<PositionStore, HelmtraderError>;

    fn save_positions(&self, store: &PositionStore) -> Result<(), HelmtraderError>;
}
