//! Logger facade: the single write entry point
//!
//! `Logger` owns the action type registry, the request correlator, and the
//! batching queue. Construct one per process and share it by `Arc`.

use crate::config::{clamp_retention, ActivityConfig};
use crate::correlator::Correlator;
use crate::error::Result;
use crate::fallback::{FallbackSink, TracingFallback};
use crate::queue::{Queue, DEFAULT_FLUSH_THRESHOLD};
use crate::registry::ActionTypeRegistry;
use crate::storage::{self, Storage};
use crate::types::{BehaviourInput, Level, LogEntry, LogRecord, Payload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner slug used for the logger's own entries
pub const SELF_OWNER: &str = "activity_log";

/// Action key of the retention cleanup meta entry
pub const CLEANUP_ACTION: &str = "cleanup";

/// Configures and builds a `Logger`
pub struct LoggerBuilder {
    storage: Arc<dyn Storage>,
    enabled: bool,
    retention_months: u32,
    flush_threshold: usize,
    fallback: Arc<dyn FallbackSink>,
    correlator: Option<Correlator>,
}

impl LoggerBuilder {
    /// Enable or disable recording (enabled by default when building directly)
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Retention horizon in months, clamped to 1..=12
    pub fn retention_months(mut self, months: u32) -> Self {
        self.retention_months = clamp_retention(months);
        self
    }

    pub fn flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    pub fn fallback(mut self, fallback: Arc<dyn FallbackSink>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn correlator(mut self, correlator: Correlator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    pub fn build(self) -> Logger {
        let registry = ActionTypeRegistry::new();
        if let Err(e) = registry.register_action_type(
            SELF_OWNER,
            CLEANUP_ACTION,
            "Log cleanup",
            "Expired activity entries were deleted",
        ) {
            tracing::warn!(error = %e, "Failed to register built-in action type");
        }

        tracing::debug!(
            backend = self.storage.name(),
            enabled = self.enabled,
            flush_threshold = self.flush_threshold,
            "Activity logger initialized"
        );

        Logger {
            enabled: self.enabled,
            retention_months: self.retention_months,
            registry,
            correlator: self.correlator.unwrap_or_default(),
            queue: Queue::new(self.storage.clone(), self.fallback, self.flush_threshold),
            storage: self.storage,
            terminated: AtomicBool::new(false),
        }
    }
}

/// Activity logger service object
pub struct Logger {
    enabled: bool,
    retention_months: u32,
    registry: ActionTypeRegistry,
    correlator: Correlator,
    queue: Queue,
    storage: Arc<dyn Storage>,
    terminated: AtomicBool,
}

impl Logger {
    /// Start building a logger over `storage`
    pub fn builder(storage: Arc<dyn Storage>) -> LoggerBuilder {
        LoggerBuilder {
            storage,
            enabled: true,
            retention_months: clamp_retention(6),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            fallback: Arc::new(TracingFallback),
            correlator: None,
        }
    }

    /// Open the configured backend and build a logger from settings
    ///
    /// Every `[[action_types]]` entry is registered; an invalid one fails the
    /// whole call.
    pub fn from_config(config: &ActivityConfig) -> Result<Self> {
        let storage = storage::open(config.storage, &config.data_dir)?;
        let logger = Self::builder_from_config(config, storage).build();
        for t in &config.action_types {
            logger.register_action_type(&t.owner, &t.key, &t.label, &t.description)?;
        }
        Ok(logger)
    }

    /// Builder seeded from settings, over an already-open backend
    pub fn builder_from_config(config: &ActivityConfig, storage: Arc<dyn Storage>) -> LoggerBuilder {
        Self::builder(storage)
            .enabled(config.enabled)
            .retention_months(config.retention_months)
            .flush_threshold(config.flush_threshold)
    }

    /// Record one activity entry
    ///
    /// `level` is parsed leniently (unknown values become `editor`) and
    /// `behaviour` accepts booleans or integer codes. Returns `false` without
    /// side effects when logging is disabled; storage failures never surface
    /// here.
    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &self,
        owner: &str,
        action_type: &str,
        message: &str,
        data: serde_json::Value,
        level: &str,
        object_type: &str,
        behaviour: impl Into<BehaviourInput>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        self.enqueue(
            LogRecord::new(owner, action_type, message)
                .data(data)
                .level(Level::from_input(level))
                .object_type(object_type)
                .behaviour(behaviour),
        )
    }

    /// Record a fully built entry, including user and object ids
    pub fn log_record(&self, record: LogRecord) -> bool {
        if !self.enabled {
            return false;
        }
        self.enqueue(record)
    }

    fn enqueue(&self, record: LogRecord) -> bool {
        if self.terminated.load(Ordering::Acquire) {
            tracing::debug!(
                owner = %record.owner,
                action_type = %record.action_type,
                "Activity logger already shut down, entry dropped"
            );
            return false;
        }
        self.queue.add(self.entry_from(record));
        true
    }

    fn entry_from(&self, record: LogRecord) -> LogEntry {
        LogEntry {
            log_id: None,
            owner: record.owner,
            action_type: record.action_type,
            object_type: record.object_type,
            behaviour: record.behaviour.normalize(),
            level: record.level,
            user_id: record.user_id,
            object_id: record.object_id,
            message: record.message,
            data: Payload::new(record.data),
            request_id: self.correlator.request_id().to_string(),
            request_context: self.correlator.request_context().to_string(),
            created_at: crate::types::now(),
        }
    }

    /// Register (or overwrite) an action type for an owner
    pub fn register_action_type(
        &self,
        owner: &str,
        type_key: &str,
        label: &str,
        description: &str,
    ) -> Result<()> {
        self.registry
            .register_action_type(owner, type_key, label, description)
    }

    /// Flush buffered entries now
    pub fn flush(&self) -> bool {
        self.queue.flush()
    }

    /// Terminal flush; only the first call does any work
    pub fn shutdown(&self) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return true;
        }
        let flushed = self.queue.flush();
        tracing::debug!(flushed, "Activity logger shut down");
        flushed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Effective retention horizon in months
    pub fn retention_months(&self) -> u32 {
        self.retention_months
    }

    pub fn registry(&self) -> &ActionTypeRegistry {
        &self.registry
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}
