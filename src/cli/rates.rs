use super::ui;
use crate::core::RateRepository;
use crate::core::currency::CurrencyRateRecord;
use anyhow::{Context, Result};
use comfy_table::Cell;

pub fn display_rates(records: &[CurrencyRateRecord]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Company"),
        ui::header_cell("Currency"),
        ui::header_cell("Rate"),
        ui::header_cell("Per unit"),
    ]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(&record.company_id),
            Cell::new(&record.currency),
            ui::number_cell(format!("{:.6}", record.rate)),
            ui::number_cell(format!("{:.4}", 1.0 / record.rate)),
        ]);
    }

    table.to_string()
}

/// Lists recorded rates, optionally for a single company.
pub async fn run(store: &dyn RateRepository, company: Option<&str>) -> Result<()> {
    let records = store
        .rates(company)
        .await
        .context("Failed to read stored rates")?;

    if records.is_empty() {
        println!("{}", ui::style_text("No rates recorded yet", ui::StyleType::Subtle));
        return Ok(());
    }

    println!("{}", display_rates(&records));
    Ok(())
}
