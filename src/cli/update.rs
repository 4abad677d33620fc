use super::ui;
use crate::core::{Company, RateUpdater, RunSummary, Scheduler, UpdateReport, UpdateStatus};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::Cell;

impl UpdateReport {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Company"),
            ui::header_cell("Status"),
            ui::header_cell("Rates"),
            ui::header_cell("Skipped quotes"),
        ]);

        for outcome in &self.outcomes {
            let (status, created, skipped) = match &outcome.status {
                UpdateStatus::Updated { created, skipped } => {
                    ("updated", Some(*created), skipped.join(", "))
                }
                UpdateStatus::NoProvider => ("no provider", None, String::new()),
                UpdateStatus::NoData => ("no data", None, String::new()),
            };
            table.add_row(vec![
                Cell::new(&outcome.company_id),
                ui::status_cell(status, outcome.status.is_success()),
                ui::format_optional_cell(created, |c| c.to_string()),
                Cell::new(skipped),
            ]);
        }

        table.to_string()
    }
}

impl RunSummary {
    pub fn display(&self) -> String {
        if self.skipped {
            return ui::style_text("Another rate update is running", ui::StyleType::Subtle);
        }
        if self.selected == 0 {
            return ui::style_text("No companies due for a rate update", ui::StyleType::Subtle);
        }

        let mut output = format!(
            "{}\n\n",
            ui::style_text("Scheduled rate update", ui::StyleType::Title)
        );
        if !self.report.outcomes.is_empty() {
            output.push_str(&self.report.display_as_table());
        }
        if !self.cleared.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Manual updates only: {}", self.cleared.join(", ")),
                    ui::StyleType::Subtle
                )
            ));
        }
        output
    }
}

fn check_report(report: &UpdateReport) -> Result<()> {
    if report.all_succeeded() {
        println!(
            "\n{}",
            ui::style_text(
                &format!("{} rates recorded", report.records_created()),
                ui::StyleType::Success
            )
        );
        return Ok(());
    }

    anyhow::bail!(
        "Unable to fetch new rates for: {}",
        report.failed_companies().join(", ")
    )
}

pub fn print_skipped_run() {
    let summary = RunSummary {
        skipped: true,
        ..Default::default()
    };
    println!("{}", summary.display());
}

/// Runs the scheduled update for every company due on `today`.
pub async fn run_due(scheduler: &Scheduler, today: NaiveDate) -> Result<()> {
    let pb = ui::new_spinner("Updating due companies...");
    let summary = scheduler.run_due(today).await;
    pb.finish_and_clear();

    let summary = summary.context("Scheduled rate update failed")?;
    println!("{}", summary.display());
    check_report(&summary.report)
}

/// Updates the given companies now, leaving their schedule untouched.
pub async fn update_now(
    updater: &RateUpdater,
    companies: &[Company],
    today: NaiveDate,
) -> Result<()> {
    if companies.is_empty() {
        anyhow::bail!("No companies to update");
    }

    let pb = ui::new_spinner("Fetching rates...");
    let report = updater.update_rates(companies, today).await;
    pb.finish_and_clear();

    let report = report.context("Rate update failed")?;
    println!("{}", report.display_as_table());
    check_report(&report)
}
