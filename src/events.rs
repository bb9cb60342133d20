//! Typed host event subscriptions
//!
//! Hosts publish `HostEvent`s; subscribers registered per `EventKind` map an
//! event to an optional `LogRecord`, which is then written through the
//! `Logger`. Kinds are validated when subscribing, not when publishing.

use crate::error::Result;
use crate::logger::Logger;
use crate::registry::validate_slug;
use crate::types::LogRecord;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Validated event kind (e.g. "post.saved")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKind(String);

impl EventKind {
    pub fn new(kind: impl Into<String>) -> Result<Self> {
        let kind = kind.into();
        validate_slug("event kind", &kind)?;
        Ok(Self(kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something that happened in the host application
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub kind: EventKind,
    pub payload: serde_json::Value,
    /// 0 = no user
    pub user_id: u64,
    /// 0 = no object
    pub object_id: u64,
}

impl HostEvent {
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            user_id: 0,
            object_id: 0,
        }
    }

    pub fn user(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn object(mut self, object_id: u64) -> Self {
        self.object_id = object_id;
        self
    }
}

/// Maps a host event to an entry, or `None` to skip it
pub type EventHandler = Arc<dyn Fn(&HostEvent) -> Option<LogRecord> + Send + Sync>;

/// Event kind → handlers, dispatched in subscription order
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<BTreeMap<EventKind, Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to an event kind
    pub fn subscribe(&self, kind: &str, handler: EventHandler) -> Result<()> {
        let kind = EventKind::new(kind)?;
        let mut handlers = self.handlers.write().map_err(|e| {
            crate::error::ActivityError::Config(format!("Event bus lock poisoned: {}", e))
        })?;

        tracing::debug!(kind = %kind, "Activity event subscription added");
        handlers.entry(kind).or_default().push(handler);
        Ok(())
    }

    /// Dispatch an event, returning how many entries were recorded
    pub fn publish(&self, event: &HostEvent, logger: &Logger) -> usize {
        let handlers: Vec<EventHandler> = match self.handlers.read() {
            Ok(handlers) => handlers.get(&event.kind).cloned().unwrap_or_default(),
            Err(e) => {
                tracing::warn!(kind = %event.kind, error = %e, "Event bus lock poisoned");
                return 0;
            }
        };

        handlers
            .iter()
            .filter_map(|handler| handler(event))
            .map(|record| {
                let record = if record.user_id == 0 {
                    record.user(event.user_id)
                } else {
                    record
                };
                if record.object_id == 0 {
                    record.object(event.object_id)
                } else {
                    record
                }
            })
            .map(|record| logger.log_record(record))
            .filter(|recorded| *recorded)
            .count()
    }

    /// Kinds with at least one subscriber, sorted
    pub fn kinds(&self) -> Vec<EventKind> {
        self.handlers
            .read()
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::LogQuery;
    use crate::storage::{MemoryStorage, Storage};

    fn saved_handler() -> EventHandler {
        Arc::new(|event: &HostEvent| {
            let title = event.payload["title"].as_str()?.to_string();
            Some(
                LogRecord::new("cms", "post.saved", format!("Saved \"{}\"", title))
                    .object_type("post")
                    .data(event.payload.clone()),
            )
        })
    }

    #[test]
    fn test_event_kind_validated() {
        assert!(EventKind::new("post.saved").is_ok());
        assert!(EventKind::new("").is_err());
        assert!(EventKind::new("post saved").is_err());

        let bus = EventBus::new();
        assert!(bus.subscribe("bad kind", saved_handler()).is_err());
        assert!(bus.kinds().is_empty());
    }

    #[test]
    fn test_publish_logs_mapped_records() {
        let storage = Arc::new(MemoryStorage::new());
        let logger = Logger::builder(storage.clone()).build();
        let bus = EventBus::new();
        bus.subscribe("post.saved", saved_handler()).unwrap();

        let kind = EventKind::new("post.saved").unwrap();
        let event = HostEvent::new(kind.clone(), serde_json::json!({"title": "Hello"}))
            .user(4)
            .object(12);
        assert_eq!(bus.publish(&event, &logger), 1);

        // Handler declines events it cannot describe
        let skipped = HostEvent::new(kind, serde_json::json!({}));
        assert_eq!(bus.publish(&skipped, &logger), 0);

        logger.flush();
        let entries = storage.query(&LogQuery::new().owner("cms")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Saved \"Hello\"");
        assert_eq!(entries[0].user_id, 4);
        assert_eq!(entries[0].object_id, 12);
    }

    #[test]
    fn test_unsubscribed_kind_is_ignored() {
        let logger = Logger::builder(Arc::new(MemoryStorage::new())).build();
        let bus = EventBus::new();
        bus.subscribe("post.saved", saved_handler()).unwrap();

        let event = HostEvent::new(
            EventKind::new("post.deleted").unwrap(),
            serde_json::json!({"title": "x"}),
        );
        assert_eq!(bus.publish(&event, &logger), 0);
        assert_eq!(bus.kinds(), vec![EventKind::new("post.saved").unwrap()]);
    }

    #[test]
    fn test_disabled_logger_records_nothing() {
        let logger = Logger::builder(Arc::new(MemoryStorage::new()))
            .enabled(false)
            .build();
        let bus = EventBus::new();
        bus.subscribe("post.saved", saved_handler()).unwrap();

        let event = HostEvent::new(
            EventKind::new("post.saved").unwrap(),
            serde_json::json!({"title": "x"}),
        );
        assert_eq!(bus.publish(&event, &logger), 0);
    }
}
