pub mod disk;
pub mod lock;
pub mod memory;

use crate::core::company::{Company, IntervalUnit};
use crate::core::error::RateError;
use crate::core::rates::RateRepository;
use tracing::debug;

pub use disk::DiskStore;
pub use lock::{RUN_LOCK_FILE, RunLock};
pub use memory::MemoryStore;

/// Brings stored companies in line with the configured ones.
///
/// Settings come from the configuration. The next execution date comes from
/// the store once the company has been seen, since the scheduler owns it from
/// then on; the configured date only seeds new companies.
pub async fn sync_companies(
    store: &dyn RateRepository,
    configured: &[Company],
) -> Result<(), RateError> {
    for company in configured {
        let stored = store.company(&company.id).await?;
        let mut merged = company.clone();
        if let Some(stored) = &stored {
            if stored.next_execution_date.is_some() {
                merged.next_execution_date = stored.next_execution_date;
            }
            // A cleared interval stays cleared while the config says manual
            if stored.interval_unit.is_none()
                && merged.interval_unit == Some(IntervalUnit::Manually)
            {
                merged.interval_unit = None;
            }
        }

        if stored.as_ref() != Some(&merged) {
            debug!(company = %company.id, "Syncing company settings from config");
            store.save_company(&merged).await?;
        }
    }
    Ok(())
}
