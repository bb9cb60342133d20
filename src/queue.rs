//! Process-local batching queue
//!
//! Entries accumulate in an ordered buffer and are written to storage in
//! one `insert` when the buffer reaches its threshold, or when the owning
//! `Logger` shuts down. There is no background flush timer.

use crate::fallback::FallbackSink;
use crate::storage::Storage;
use crate::types::LogEntry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of buffered entries that triggers a flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 50;

pub struct Queue {
    buffer: Mutex<Vec<LogEntry>>,
    threshold: usize,
    storage: Arc<dyn Storage>,
    fallback: Arc<dyn FallbackSink>,
    flushes: AtomicU64,
}

impl Queue {
    /// Create a queue; a threshold of 0 is treated as 1
    pub fn new(
        storage: Arc<dyn Storage>,
        fallback: Arc<dyn FallbackSink>,
        threshold: usize,
    ) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            threshold: threshold.max(1),
            storage,
            fallback,
            flushes: AtomicU64::new(0),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Buffer an entry, flushing synchronously if the threshold is reached
    pub fn add(&self, entry: LogEntry) {
        let full = match self.buffer.lock() {
            Ok(mut buffer) => {
                buffer.push(entry);
                buffer.len() >= self.threshold
            }
            Err(e) => {
                self.fallback
                    .write(&entry, &format!("queue lock poisoned: {}", e));
                return;
            }
        };

        if full {
            self.flush();
        }
    }

    /// Write every buffered entry to storage
    ///
    /// The buffer is emptied before the insert. On failure every entry of the
    /// batch goes to the fallback sink and `false` is returned. An empty
    /// buffer is a successful no-op.
    pub fn flush(&self) -> bool {
        let batch = match self.buffer.lock() {
            Ok(mut buffer) => std::mem::take(&mut *buffer),
            Err(e) => {
                tracing::error!(error = %e, "Activity queue lock poisoned; batch unrecoverable");
                return false;
            }
        };
        if batch.is_empty() {
            return true;
        }

        self.flushes.fetch_add(1, Ordering::Relaxed);
        match self.storage.insert(&batch) {
            Ok(()) => {
                tracing::debug!(
                    backend = self.storage.name(),
                    entries = batch.len(),
                    "Activity batch flushed"
                );
                true
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    backend = self.storage.name(),
                    entries = batch.len(),
                    error = %reason,
                    "Activity flush failed, writing batch to fallback"
                );
                for entry in &batch {
                    self.fallback.write(entry, &reason);
                }
                false
            }
        }
    }

    /// Number of buffered entries
    pub fn len(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of insert attempts made so far
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ActivityError, Result};
    use crate::fallback::MemoryFallback;
    use crate::query::LogQuery;
    use crate::storage::MemoryStorage;
    use crate::types::{Behaviour, Level, Payload};
    use chrono::{DateTime, Utc};

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn insert(&self, _entries: &[LogEntry]) -> Result<()> {
            Err(ActivityError::storage("broken", "write refused"))
        }
        fn query(&self, _query: &LogQuery) -> Result<Vec<LogEntry>> {
            Ok(Vec::new())
        }
        fn count(&self, _query: &LogQuery) -> Result<u64> {
            Ok(0)
        }
        fn delete_before(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    fn entry(i: usize) -> LogEntry {
        LogEntry {
            log_id: None,
            owner: "plugin-a".to_string(),
            action_type: "save".to_string(),
            object_type: String::new(),
            behaviour: Behaviour::Success,
            level: Level::Editor,
            user_id: 0,
            object_id: 0,
            message: format!("entry {}", i),
            data: Payload::empty(),
            request_id: String::new(),
            request_context: String::new(),
            created_at: crate::types::now(),
        }
    }

    #[test]
    fn test_no_insert_below_threshold() {
        let storage = Arc::new(MemoryStorage::new());
        let queue = Queue::new(storage.clone(), Arc::new(MemoryFallback::default()), 3);

        queue.add(entry(0));
        queue.add(entry(1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.flush_count(), 0);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_insert_at_threshold() {
        let storage = Arc::new(MemoryStorage::new());
        let queue = Queue::new(storage.clone(), Arc::new(MemoryFallback::default()), 3);

        for i in 0..3 {
            queue.add(entry(i));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.flush_count(), 1);
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let queue = Queue::new(storage, Arc::new(MemoryFallback::default()), 10);
        assert!(queue.flush());
        assert_eq!(queue.flush_count(), 0);
    }

    #[test]
    fn test_zero_threshold_clamped() {
        let queue = Queue::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryFallback::default()),
            0,
        );
        assert_eq!(queue.threshold(), 1);
        queue.add(entry(0));
        assert_eq!(queue.flush_count(), 1);
    }

    #[test]
    fn test_failed_flush_goes_to_fallback() {
        let fallback = Arc::new(MemoryFallback::default());
        let queue = Queue::new(Arc::new(BrokenStorage), fallback.clone(), 10);

        for i in 0..3 {
            queue.add(entry(i));
        }
        assert!(!queue.flush());
        assert!(queue.is_empty());

        let captured = fallback.entries();
        assert_eq!(captured.len(), 3);
        assert_eq!(captured[0].entry.message, "entry 0");
        assert!(captured[0].reason.contains("write refused"));
    }
}
