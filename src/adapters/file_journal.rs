//! Crash-safe JSON file journal.
//!
//! Every save goes to a `.tmp` sibling, is fsynced, then renamed over the
//! target so a crash mid-write never clobbers the last good file. An
//! unparseable file on load is moved aside to a timestamped `.bak` and
//! replaced with an empty store; corruption is survivable, not fatal.
//!
//! `transactions.json` and `snapshots.json` are top-level objects, not bare
//! arrays: the transaction log carries the starting capital as a metadata
//! header. Daily and cumulative P&L deltas are derived here at upsert time
//! so every persisted snapshot is internally consistent.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::error::HelmtraderError;
use crate::domain::journal::{DailySnapshot, TransactionRecord};
use crate::domain::position::PositionStore;
use crate::ports::journal_port::JournalStore;

const TRANSACTIONS_FILE: &str = "transactions.json";
const SNAPSHOTS_FILE: &str = "snapshots.json";
const POSITIONS_FILE: &str = "positions.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TransactionLog {
    starting_capital: f64,
    records: Vec<TransactionRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotLog {
    snapshots: Vec<DailySnapshot>,
}

pub struct FileJournalStore {
    data_dir: PathBuf,
    snapshot_retention_days: usize,
    starting_capital: f64,
}

impl FileJournalStore {
    pub fn new(
        data_dir: PathBuf,
        snapshot_retention_days: usize,
        starting_capital: f64,
    ) -> Result<Self, HelmtraderError> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            snapshot_retention_days,
            starting_capital,
        })
    }

    fn journal_error(path: &Path, reason: String) -> HelmtraderError {
        HelmtraderError::Journal {
            path: path.display().to_string(),
            reason,
        }
    }

    /// Load a JSON document, quarantining a corrupt file instead of failing.
    fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        file_name: &str,
    ) -> Result<T, HelmtraderError> {
        let path = self.data_dir.join(file_name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(e) => {
                let backup = self
                    .data_dir
                    .join(format!("{}.corrupt-{}.bak", file_name, Utc::now().timestamp()));
                warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "journal file corrupt, backing up and starting empty"
                );
                fs::rename(&path, &backup)?;
                Ok(T::default())
            }
        }
    }

    /// Write to a temp sibling, fsync, then atomically rename into place.
    fn save_atomic<T: Serialize>(&self, file_name: &str, value: &T) -> Result<(), HelmtraderError> {
        let path = self.data_dir.join(file_name);
        let tmp_path = self.data_dir.join(format!("{}.tmp", file_name));

        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| Self::journal_error(&path, format!("serialize failed: {}", e)))?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

impl JournalStore for FileJournalStore {
    fn append_transaction(&self, record: &TransactionRecord) -> Result<(), HelmtraderError> {
        let mut log: TransactionLog = self.load_or_default(TRANSACTIONS_FILE)?;
        if log.records.is_empty() {
            log.starting_capital = self.starting_capital;
        }
        log.records.push(record.clone());
        self.save_atomic(TRANSACTIONS_FILE, &log)
    }

    fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> Result<(), HelmtraderError> {
        let mut log: SnapshotLog = self.load_or_default(SNAPSHOTS_FILE)?;

        // Daily deltas measure against the latest strictly-earlier snapshot,
        // or the starting capital when none exists yet.
        let baseline = log
            .snapshots
            .iter()
            .filter(|s| s.date < snapshot.date)
            .max_by_key(|s| s.date)
            .map(|s| s.total_assets)
            .unwrap_or(self.starting_capital);

        let mut snapshot = snapshot.clone();
        snapshot.daily_pnl = snapshot.total_assets - baseline;
        snapshot.daily_pnl_pct = if baseline > 0.0 {
            snapshot.daily_pnl / baseline * 100.0
        } else {
            0.0
        };
        snapshot.cumulative_pnl = snapshot.total_assets - self.starting_capital;
        snapshot.cumulative_pnl_pct = if self.starting_capital > 0.0 {
            snapshot.cumulative_pnl / self.starting_capital * 100.0
        } else {
            0.0
        };

        match log.snapshots.iter_mut().find(|s| s.date == snapshot.date) {
            Some(existing) => *existing = snapshot,
            None => log.snapshots.push(snapshot),
        }
        log.snapshots.sort_by_key(|s| s.date);

        if log.snapshots.len() > self.snapshot_retention_days {
            let excess = log.snapshots.len() - self.snapshot_retention_days;
            log.snapshots.drain(..excess);
        }
        self.save_atomic(SNAPSHOTS_FILE, &log)
    }

    fn previous_snapshot(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DailySnapshot>, HelmtraderError> {
        let log: SnapshotLog = self.load_or_default(SNAPSHOTS_FILE)?;
        Ok(log
            .snapshots
            .into_iter()
            .filter(|s| s.date < date)
            .max_by_key(|s| s.date))
    }

    fn transactions(&self) -> Result<Vec<TransactionRecord>, HelmtraderError> {
        let log: TransactionLog = self.load_or_default(TRANSACTIONS_FILE)?;
        Ok(log.records)
    }

    fn load_positions(&self) -> Result<PositionStore, HelmtraderError> {
        self.load_or_default(POSITIONS_FILE)
    }

    fn save_positions(&self, store: &PositionStore) -> Result<(), HelmtraderError> {
        self.save_atomic(POSITIONS_FILE, store)
    }
}
