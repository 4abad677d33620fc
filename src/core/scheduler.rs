//! Selects due companies, advances their schedule and runs the update batch.

use super::error::RateError;
use super::rates::RateRepository;
use super::updater::{RateUpdater, UpdateReport};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Companies that were due
    pub selected: usize,
    /// Companies without a periodic interval, cleared and left out of the batch
    pub cleared: Vec<String>,
    pub report: UpdateReport,
    /// Another run was already in progress
    pub skipped: bool,
}

pub struct Scheduler {
    store: Arc<dyn RateRepository>,
    updater: RateUpdater,
    running: Mutex<()>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn RateRepository>, updater: RateUpdater) -> Self {
        Self {
            store,
            updater,
            running: Mutex::new(()),
        }
    }

    /// Runs every company due on or before `today`, advancing schedules from
    /// the current local time.
    pub async fn run_due(&self, today: NaiveDate) -> Result<RunSummary, RateError> {
        self.run_due_at(today, Local::now().naive_local()).await
    }

    /// Same as [`Scheduler::run_due`] with an explicit wall-clock `now`.
    ///
    /// Next execution dates are counted from `now`, not from the previous due
    /// date, and are saved before any rate is fetched.
    pub async fn run_due_at(
        &self,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<RunSummary, RateError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Rate update already in progress, skipping this run");
            return Ok(RunSummary {
                skipped: true,
                ..Default::default()
            });
        };

        let due = self.store.companies_due(today).await?;
        let mut summary = RunSummary {
            selected: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            debug!(%today, "No companies due for a rate update");
            return Ok(summary);
        }

        let mut batch = Vec::with_capacity(due.len());
        for mut company in due {
            let interval = company.interval_unit.unwrap_or_default();
            match interval.next_run(now) {
                Some(next) => {
                    debug!(
                        company = %company.id,
                        %interval,
                        %next,
                        "Advancing next execution date"
                    );
                    company.next_execution_date = Some(next);
                    self.store.save_company(&company).await?;
                    batch.push(company);
                }
                None => {
                    if company.interval_unit.is_some() {
                        info!(company = %company.id, "Manual rate updates, clearing interval");
                    }
                    company.interval_unit = None;
                    self.store.save_company(&company).await?;
                    summary.cleared.push(company.id);
                }
            }
        }

        if !batch.is_empty() {
            summary.report = self.updater.update_rates(&batch, today).await?;
        }
        Ok(summary)
    }
}
