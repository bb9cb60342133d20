//! Storage trait, the core abstraction for log backends
//!
//! All backends (JSON-lines files, SQLite, in-memory) implement `Storage`
//! so that the queue, the cleanup scheduler, and the query engine never
//! depend on where entries actually live.

use crate::error::{ActivityError, Result};
use crate::query::LogQuery;
use crate::types::LogEntry;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Core trait for log backends
///
/// Implementations are shared by handle and must tolerate concurrent
/// callers; the write path itself is single-flow.
pub trait Storage: Send + Sync {
    /// Write a batch of entries
    ///
    /// Partial writes are allowed, but an `Err` must be returned whenever the
    /// batch as a whole could not be confirmed.
    fn insert(&self, entries: &[LogEntry]) -> Result<()>;

    /// Filtered, ordered, paginated read
    fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>>;

    /// Number of entries matching the query's filters (pagination ignored)
    fn count(&self, query: &LogQuery) -> Result<u64>;

    /// Delete entries created strictly before `cutoff`, returning how many went
    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Backend name (e.g., "file", "sqlite", "memory")
    fn name(&self) -> &str;

    /// Distinct owners with at least one stored entry, sorted
    fn owners(&self) -> Result<Vec<String>> {
        let owners: BTreeSet<String> = self
            .query(&LogQuery::new())?
            .into_iter()
            .map(|e| e.owner)
            .collect();
        Ok(owners.into_iter().collect())
    }

    /// Delete entries older than `months` months
    ///
    /// An entry exactly at the cutoff is retained.
    fn delete_older_than(&self, months: u32) -> Result<u64> {
        let cutoff = retention_cutoff(Utc::now(), months)?;
        self.delete_before(cutoff)
    }
}

/// `now` minus `months` calendar months
pub fn retention_cutoff(now: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    now.checked_sub_months(Months::new(months)).ok_or_else(|| {
        ActivityError::Config(format!("Retention of {} months is out of range", months))
    })
}

/// Selectable backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Sqlite,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::Sqlite => "sqlite",
            StorageKind::Memory => "memory",
        }
    }
}

/// Open the configured backend rooted at `data_dir`
pub fn open(kind: StorageKind, data_dir: &Path) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match kind {
        StorageKind::File => Arc::new(FileStorage::open(data_dir.join("logs"))?),
        StorageKind::Sqlite => Arc::new(SqliteStorage::open(data_dir.join("activity.db"))?),
        StorageKind::Memory => Arc::new(MemoryStorage::default()),
    };
    tracing::debug!(backend = storage.name(), dir = %data_dir.display(), "Storage opened");
    Ok(storage)
}
