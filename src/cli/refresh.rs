use super::ui;
use crate::core::config::AppConfig;
use crate::core::refresh::group_holdings;
use crate::core::{MarketData, RefreshCoordinator, RefreshReport};
use crate::store::memory::{HoldingRecord, MemoryHoldingStore};
use anyhow::Result;
use comfy_table::Cell;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

pub fn display_holdings(records: &[HoldingRecord]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Type"),
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Quantity"),
        ui::header_cell("Price (TRY)"),
        ui::header_cell("Value (TRY)"),
        ui::header_cell("Updated"),
    ]);

    for record in records {
        let holding = &record.holding;
        table.add_row(vec![
            Cell::new(holding.id),
            Cell::new(holding.asset_type),
            Cell::new(&holding.code),
            Cell::new(record.name.as_deref().unwrap_or("")),
            ui::number_cell(holding.quantity.normalize().to_string()),
            ui::format_optional_cell(record.price, |p| format!("{p:.4}")),
            ui::format_optional_cell(record.market_value(), |v| format!("{v:.2}")),
            ui::format_optional_cell(record.updated_at, |t| {
                t.format("%Y-%m-%d %H:%M").to_string()
            }),
        ]);
    }

    let priced: Vec<Decimal> = records.iter().filter_map(HoldingRecord::market_value).collect();
    let total = priced.iter().copied().sum::<Decimal>();
    let total_style = if priced.len() == records.len() {
        ui::StyleType::TotalValue
    } else {
        ui::StyleType::Warning
    };

    format!(
        "{}\n\n{}\n\n{}: {}",
        ui::style_text("Holdings", ui::StyleType::Title),
        table,
        ui::style_text("Total Value (TRY)", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{total:.2}"), total_style)
    )
}

pub fn display_report(report: &RefreshReport) -> String {
    let failed_style = if report.failed > 0 {
        ui::StyleType::Error
    } else {
        ui::StyleType::Subtle
    };
    let skipped_style = if report.skipped > 0 {
        ui::StyleType::Warning
    } else {
        ui::StyleType::Subtle
    };
    format!(
        "Refreshed: {} of {}  Skipped: {}  Failed: {}",
        ui::style_text(&report.succeeded.to_string(), ui::StyleType::TotalValue),
        report.total(),
        ui::style_text(&report.skipped.to_string(), skipped_style),
        ui::style_text(&report.failed.to_string(), failed_style),
    )
}

/// Refreshes every configured holding and prints the result.
pub async fn run(config: &AppConfig, market: Arc<MarketData>) -> Result<RefreshReport> {
    let holdings = config.holding_refs();
    if holdings.is_empty() {
        println!(
            "{}",
            ui::style_text("No holdings configured.", ui::StyleType::Subtle)
        );
        return Ok(RefreshReport::default());
    }

    let store = Arc::new(MemoryHoldingStore::new());
    for (holding, configured) in holdings.iter().zip(&config.holdings) {
        store.insert(holding.clone(), configured.name.clone()).await;
    }

    let pb = ui::new_progress_bar(group_holdings(&holdings).len() as u64, true);
    pb.set_message("Refreshing prices...");
    let coordinator = RefreshCoordinator::new(market, store.clone())
        .with_concurrency(config.refresh.concurrency)
        .with_group_timeout(config.refresh.group_timeout());
    let report = coordinator
        .refresh_all_with_progress(&holdings, &|| pb.inc(1))
        .await;
    pb.finish_and_clear();

    info!(?report, "Refresh done");
    println!("{}", display_holdings(&store.records().await));
    println!("\n{}", display_report(&report));
    Ok(report)
}
