//! In-memory storage backend
//!
//! Keeps entries in a `Vec` for tests and single-process embedding.
//! Contents are lost on drop.

use super::Storage;
use crate::error::{ActivityError, Result};
use crate::query::LogQuery;
use crate::types::LogEntry;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<Vec<LogEntry>>,
    next_id: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> ActivityError {
    ActivityError::storage("memory", format!("lock poisoned: {}", e))
}

impl Storage for MemoryStorage {
    fn insert(&self, entries: &[LogEntry]) -> Result<()> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        for entry in entries {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            let mut entry = entry.clone();
            entry.log_id = Some(format!("mem-{}", id));
            stored.push(entry);
        }
        Ok(())
    }

    fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let stored = self.entries.read().map_err(poisoned)?;
        Ok(query.apply(stored.iter().cloned()))
    }

    fn count(&self, query: &LogQuery) -> Result<u64> {
        let stored = self.entries.read().map_err(poisoned)?;
        Ok(stored.iter().filter(|e| query.matches(e)).count() as u64)
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        let before = stored.len();
        stored.retain(|e| e.created_at >= cutoff);
        Ok((before - stored.len()) as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
