use std::sync::Arc;

use crate::cleanup::CleanupScheduler;
use crate::error::{ActivityError, Result};
use crate::logger::Logger;

/// Execute the `cleanup` command: enforce retention once.
pub fn execute(logger: Arc<Logger>, months: Option<u32>) -> Result<()> {
    let report = CleanupScheduler::new(logger.clone()).run_with_months(months);
    logger.shutdown();

    if let Some(error) = report.error {
        return Err(ActivityError::storage(logger.storage().name(), error));
    }

    println!(
        "Deleted {} entries older than {} month(s).",
        report.deleted, report.months
    );
    Ok(())
}
