//! # a3s-activity
//!
//! Structured activity and audit logging for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-activity` records who did what, to which object, and with what
//! outcome. Entries are buffered in-process, flushed in batches to a
//! pluggable storage backend, expired by a retention scheduler, and read
//! back through a filtered query API (library, HTTP, or CLI).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_activity::{Logger, LogQuery, MemoryStorage, Storage};
//!
//! # fn example() -> a3s_activity::Result<()> {
//! let storage = Arc::new(MemoryStorage::new());
//! let logger = Logger::builder(storage.clone()).build();
//!
//! logger.register_action_type("shop", "order.paid", "Order paid", "")?;
//! logger.log(
//!     "shop",
//!     "order.paid",
//!     "Order #42 paid",
//!     serde_json::json!({"total": 19.99}),
//!     "editor",
//!     "order",
//!     true,
//! );
//! logger.flush();
//!
//! let entries = storage.query(&LogQuery::new().owner("shop"))?;
//! assert_eq!(entries.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - **file** — one JSON-lines file per UTC day
//! - **sqlite** — indexed table, filters pushed down to SQL
//! - **memory** — in-process, for tests and embedding
//!
//! ## Architecture
//!
//! - **Storage** trait — contract every backend implements
//! - **Logger** — write facade owning the registry, correlator, and queue
//! - **Queue** — batches entries, falls back to a `FallbackSink` on failure
//! - **CleanupScheduler** — retention enforcement
//! - **query** — filter normalization, pagination, request grouping

pub mod api;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod correlator;
pub mod dirs;
pub mod error;
pub mod events;
pub mod fallback;
pub mod logger;
pub mod query;
pub mod queue;
pub mod registry;
pub mod storage;
pub mod types;

// Re-export core types
pub use cleanup::{CleanupReport, CleanupScheduler};
pub use config::ActivityConfig;
pub use correlator::{Correlator, Invocation};
pub use error::{ActivityError, Result};
pub use events::{EventBus, EventHandler, EventKind, HostEvent};
pub use fallback::{FallbackSink, MemoryFallback, TracingFallback};
pub use logger::{Logger, LoggerBuilder};
pub use query::{FilterArgs, LogQuery, Order, QueryPage};
pub use queue::Queue;
pub use registry::{ActionType, ActionTypeRegistry};
pub use types::{Behaviour, BehaviourInput, Level, LogEntry, LogRecord, Payload};

// Re-export backends for convenience
pub use storage::{FileStorage, MemoryStorage, SqliteStorage, Storage, StorageKind};
