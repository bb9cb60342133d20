//! Retention enforcement
//!
//! `CleanupScheduler` deletes entries older than the retention horizon and
//! records a developer-level meta entry whenever something was removed.
//! It can run once on demand or tick on a tokio interval.

use crate::config::clamp_retention;
use crate::logger::{Logger, CLEANUP_ACTION, SELF_OWNER};
use crate::types::{Behaviour, Level, LogRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Outcome of one cleanup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Effective retention horizon used
    pub months: u32,
    /// Entries deleted (0 on failure)
    pub deleted: u64,
    /// Failure reason, if the backend could not delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CleanupReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct CleanupScheduler {
    logger: Arc<Logger>,
}

impl CleanupScheduler {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    /// Enforce the configured retention horizon
    pub fn run(&self) -> CleanupReport {
        self.run_with_months(None)
    }

    /// Enforce a retention horizon, overriding the configured one if given
    ///
    /// Never fails: a backend error is logged and reported, and the next
    /// run simply tries again.
    pub fn run_with_months(&self, months: Option<u32>) -> CleanupReport {
        let months = clamp_retention(months.unwrap_or_else(|| self.logger.retention_months()));
        let storage = self.logger.storage();

        match storage.delete_older_than(months) {
            Ok(deleted) => {
                if deleted > 0 {
                    self.logger.log_record(
                        LogRecord::new(
                            SELF_OWNER,
                            CLEANUP_ACTION,
                            format!(
                                "Deleted {} activity entries older than {} months",
                                deleted, months
                            ),
                        )
                        .level(Level::Developer)
                        .behaviour(Behaviour::Success)
                        .data(serde_json::json!({ "deleted": deleted, "months": months })),
                    );
                }
                tracing::info!(
                    backend = storage.name(),
                    months,
                    deleted,
                    "Activity cleanup finished"
                );
                CleanupReport {
                    months,
                    deleted,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    backend = storage.name(),
                    months,
                    error = %e,
                    "Activity cleanup failed, will retry on next run"
                );
                CleanupReport {
                    months,
                    deleted: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Run cleanup every `interval` on the tokio runtime, starting now
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let scheduler = self.clone();
                match tokio::task::spawn_blocking(move || scheduler.run()).await {
                    Ok(report) => {
                        tracing::debug!(deleted = report.deleted, "Scheduled cleanup tick");
                    }
                    Err(e) => {
                        tracing::error!("Cleanup task panicked: {}", e);
                    }
                }
            }
        })
    }
}
