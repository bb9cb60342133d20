//! Fallback sink: where entries go when a flush fails
//!
//! A failed `Storage::insert` must never be silent. The queue hands every
//! entry of the rejected batch to a `FallbackSink`; the default sink writes
//! them to the process diagnostic log via `tracing`.

use crate::types::LogEntry;
use std::sync::Mutex;

/// Tracing target used by `TracingFallback`
pub const FALLBACK_TARGET: &str = "a3s_activity::fallback";

/// An entry that could not be persisted, with the reason
#[derive(Debug, Clone)]
pub struct FailedEntry {
    pub entry: LogEntry,
    pub reason: String,
}

/// Out-of-band target for entries a backend rejected
///
/// Implementations must not fail; there is nowhere left to report to.
pub trait FallbackSink: Send + Sync {
    fn write(&self, entry: &LogEntry, reason: &str);
}

/// Writes each failed entry as an `error` event carrying the entry JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFallback;

impl FallbackSink for TracingFallback {
    fn write(&self, entry: &LogEntry, reason: &str) {
        let json = serde_json::to_string(entry)
            .unwrap_or_else(|e| format!("<unserializable entry: {}>", e));
        tracing::error!(
            target: FALLBACK_TARGET,
            owner = %entry.owner,
            action_type = %entry.action_type,
            reason = %reason,
            entry = %json,
            "Activity entry not persisted"
        );
    }
}

/// Keeps failed entries in memory, for tests and embedding hosts
///
/// Oldest entries are dropped once `max_entries` is exceeded (0 = unbounded).
pub struct MemoryFallback {
    entries: Mutex<Vec<FailedEntry>>,
    max_entries: usize,
}

impl MemoryFallback {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries,
        }
    }

    /// Number of entries captured
    pub fn count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Captured entries, oldest first
    pub fn entries(&self) -> Vec<FailedEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Default for MemoryFallback {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl FallbackSink for MemoryFallback {
    fn write(&self, entry: &LogEntry, reason: &str) {
        tracing::warn!(
            owner = %entry.owner,
            action_type = %entry.action_type,
            reason = %reason,
            "Activity entry captured by fallback"
        );

        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.push(FailedEntry {
            entry: entry.clone(),
            reason: reason.to_string(),
        });

        if self.max_entries > 0 && entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(..drain_count);
        }
    }
}
