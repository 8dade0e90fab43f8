use super::ui;
use crate::core::config::AppConfig;
use crate::core::valuation::{self, PortfolioSummary, ValueDelta};
use crate::core::{Warehouse, queries};
use anyhow::{Context, Result};
use comfy_table::Cell;

impl PortfolioSummary {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();

        table.set_header(vec![
            ui::header_cell("Symbol"),
            ui::header_cell("Quantity"),
            ui::header_cell("Bought @"),
            ui::header_cell("Current"),
            ui::header_cell("Value"),
            ui::header_cell("Cost"),
            ui::header_cell("P/L"),
            ui::header_cell("Change (%)"),
        ]);

        for position in &self.positions {
            let current_price = if position.price_available {
                ui::amount_cell(position.current_price)
            } else {
                Cell::new("unavailable").fg(comfy_table::Color::Red)
            };
            table.add_row(vec![
                Cell::new(&position.symbol),
                Cell::new(position.quantity.normalize().to_string())
                    .set_alignment(comfy_table::CellAlignment::Right),
                ui::amount_cell(position.price_per_unit_bought),
                current_price,
                ui::amount_cell(position.current_value),
                ui::amount_cell(position.bought_value),
                ui::signed_amount_cell(position.profit_loss),
                ui::change_cell(position.percent_change),
            ]);
        }

        let mut output = format!("{}\n\n", ui::style_text("Portfolio", ui::StyleType::Title));
        output.push_str(&table.to_string());

        let overall = self
            .overall_percent_change
            .map_or("N/A".to_string(), |p| format!("{}%", ui::format_signed(p)));
        output.push_str(&format!(
            "\n\n{} {}   {} {}   {} {} ({})",
            ui::style_text("Total Value:", ui::StyleType::TotalLabel),
            ui::style_text(
                &ui::format_amount(self.total_current_value),
                ui::StyleType::TotalValue
            ),
            ui::style_text("Total Cost:", ui::StyleType::TotalLabel),
            ui::format_amount(self.total_bought_value),
            ui::style_text("Total P/L:", ui::StyleType::TotalLabel),
            ui::style_signed(
                self.total_profit_loss,
                &ui::format_signed(self.total_profit_loss)
            ),
            overall,
        ));

        let unavailable: Vec<&str> = self
            .positions
            .iter()
            .filter(|p| !p.price_available)
            .map(|p| p.symbol.as_str())
            .collect();
        if !unavailable.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!(
                        "No current price for {}; valued at zero",
                        unavailable.join(", ")
                    ),
                    ui::StyleType::Error
                )
            ));
        }

        output
    }
}

impl ValueDelta {
    pub fn display(&self) -> String {
        let percent = self
            .delta_percent
            .map_or("N/A".to_string(), |p| format!("{}%", ui::format_signed(p)));
        let text = format!(
            "{} ({percent}) since last update",
            ui::format_signed(self.delta)
        );
        ui::style_signed(self.delta, &text)
    }
}

/// Prints a one-shot valuation of the configured portfolio.
pub async fn run(config: &AppConfig, warehouse: &dyn Warehouse) -> Result<()> {
    let pb = ui::new_progress_bar(2, true);
    pb.set_message("Fetching portfolio...");
    let inputs = queries::positions(warehouse, &config.warehouse)
        .await
        .context("Failed to load portfolio positions")?;
    pb.inc(1);
    pb.set_message("Fetching prices...");
    let prices = queries::current_prices(warehouse, &config.warehouse)
        .await
        .context("Failed to load current prices")?;
    pb.inc(1);
    pb.finish_and_clear();

    let positions = valuation::normalize_positions(&inputs)?;
    let summary = valuation::value_portfolio(&positions, &prices)?;
    println!("{}", summary.display_as_table());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::valuation::{PortfolioPosition, value_portfolio};
    use crate::core::CurrentPriceMap;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_as_table_marks_unavailable_prices() {
        let positions = vec![
            PortfolioPosition {
                symbol: "BTC".to_string(),
                quantity: dec!(0.5),
                price_per_unit_bought: dec!(20000),
            },
            PortfolioPosition {
                symbol: "ETH".to_string(),
                quantity: dec!(2),
                price_per_unit_bought: dec!(1500),
            },
        ];
        let prices: CurrentPriceMap = [("BTC".to_string(), dec!(25000))].into_iter().collect();
        let summary = value_portfolio(&positions, &prices).unwrap();

        let output = summary.display_as_table();
        assert!(output.contains("BTC"));
        assert!(output.contains("12500.00"));
        assert!(output.contains("unavailable"));
        assert!(output.contains("-3000.00"));
        assert!(output.contains("No current price for ETH"));
    }

    #[test]
    fn test_value_delta_display() {
        let delta = ValueDelta::between(dec!(16000), dec!(16100)).unwrap();
        let text = delta.display();
        assert!(text.contains("+100.00"));
        assert!(text.contains("+0.63%"));

        let unknown = ValueDelta::between(dec!(0), dec!(10)).unwrap();
        assert!(unknown.display().contains("N/A"));
    }
}
