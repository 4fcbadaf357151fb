use super::ui;
use crate::core::{AssetType, FetchError, MarketData, Quote};
use anyhow::{Result, bail};
use comfy_table::Cell;

/// Renders a single quote as a two-column table.
pub fn display_quote(quote: &Quote) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);

    table.add_row(vec![Cell::new("Type"), Cell::new(quote.asset_type())]);
    table.add_row(vec![Cell::new("Code"), Cell::new(quote.code())]);
    table.add_row(vec![Cell::new("Name"), Cell::new(quote.name())]);
    table.add_row(vec![
        Cell::new("Price"),
        ui::number_cell(format!("{:.4}", quote.price())),
    ]);
    table.add_row(vec![
        Cell::new("Buy"),
        ui::format_optional_cell(quote.buy_price(), |p| format!("{p:.4}")),
    ]);
    table.add_row(vec![
        Cell::new("Sell"),
        ui::format_optional_cell(quote.sell_price(), |p| format!("{p:.4}")),
    ]);
    table.add_row(vec![
        Cell::new("Fetched"),
        Cell::new(quote.fetched_at().format("%Y-%m-%d %H:%M:%S UTC")),
    ]);

    format!(
        "{} {}\n\n{}",
        ui::style_text("Quote:", ui::StyleType::Title),
        quote.code(),
        table
    )
}

/// What the user should make of a failed lookup.
pub fn describe_failure(asset_type: AssetType, code: &str, error: &FetchError) -> String {
    match error {
        FetchError::NotFound => format!("No data for {asset_type} code {code}"),
        FetchError::Transient(reason) => {
            format!("Could not fetch {asset_type} {code}, try again later ({reason})")
        }
        FetchError::Config(reason) => format!("Configuration problem: {reason}"),
    }
}

pub async fn run(market: &MarketData, asset_type: AssetType, code: &str) -> Result<()> {
    let code = code.trim().to_uppercase();
    let pb = ui::new_progress_bar(1, true);
    pb.set_message(format!("Fetching {asset_type} {code}..."));
    let outcome = market.get_quote(asset_type, &code).await;
    pb.finish_and_clear();

    match outcome {
        Ok(quote) => {
            println!("{}", display_quote(&quote));
            Ok(())
        }
        Err(e) => {
            let message = describe_failure(asset_type, &code, &e);
            eprintln!("{}", ui::style_text(&message, ui::StyleType::Error));
            bail!(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    #[test]
    fn test_display_quote_lists_prices() {
        let quote = Quote::new(
            AssetType::Currency,
            "usd",
            "ABD DOLARI",
            Decimal::new(365917, 4),
            Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap(),
        )
        .unwrap()
        .with_spread(Some(Decimal::new(364457, 4)), None);

        let output = display_quote(&quote);
        assert!(output.contains("ABD DOLARI"));
        assert!(output.contains("36.5917"));
        assert!(output.contains("36.4457"));
        assert!(output.contains("N/A"));
        assert!(output.contains("2025-03-14 12:00:00 UTC"));
    }

    #[test]
    fn test_describe_failure_by_kind() {
        assert_eq!(
            describe_failure(AssetType::Fund, "XYZ", &FetchError::NotFound),
            "No data for fund code XYZ"
        );
        assert!(
            describe_failure(AssetType::Equity, "THYAO", &FetchError::transient("timeout"))
                .contains("try again later")
        );
        assert!(
            describe_failure(AssetType::Metal, "GA", &FetchError::config("no credentials"))
                .starts_with("Configuration problem")
        );
    }
}
