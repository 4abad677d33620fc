use super::ui;
use crate::core::{Company, RateRepository};
use anyhow::{Context, Result};
use comfy_table::Cell;

pub fn display_companies(companies: &[Company]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Company"),
        ui::header_cell("Name"),
        ui::header_cell("Bank"),
        ui::header_cell("Base"),
        ui::header_cell("Offset"),
        ui::header_cell("Interval"),
        ui::header_cell("Next run"),
    ]);

    for company in companies {
        table.add_row(vec![
            Cell::new(&company.id),
            Cell::new(&company.name),
            ui::format_optional_cell(company.provider, |b| b.display_name().to_string()),
            Cell::new(company.currency_base.to_string()),
            ui::number_cell(format!("{:.4}", company.rate_offset)),
            ui::format_optional_cell(company.interval_unit, |i| i.to_string()),
            ui::format_optional_cell(company.next_execution_date, |d| d.to_string()),
        ]);
    }

    table.to_string()
}

/// Shows each company's rate settings and schedule.
pub async fn run(store: &dyn RateRepository) -> Result<()> {
    let companies = store
        .companies()
        .await
        .context("Failed to read stored companies")?;

    if companies.is_empty() {
        println!(
            "{}",
            ui::style_text("No companies configured", ui::StyleType::Subtle)
        );
        return Ok(());
    }

    println!("{}", display_companies(&companies));
    Ok(())
}
