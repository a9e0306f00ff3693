use chrono::Local;
use indicator_bank_builder::*;
use std::error::Error;
use std::path::PathBuf;

/// Runs the bank over a local folder tree:
///
/// ```text
/// <root>/fichas/<area>/<year>/*.xlsx
/// <root>/banco/<year>/<mes>/
/// <root>/reportes/
/// ```
///
/// Usage: `cargo run --example local_run -- <root> [config.json]`
fn main() -> std::result::Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let root = PathBuf::from(args.next().unwrap_or_else(|| "indicadores".to_string()));

    let config = match args.next() {
        Some(path) => BankConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => BankConfig::default(),
    };

    println!("📁 Processing fichas under {}", root.display());
    println!("   Year: {}", config.year);

    let store = LocalFolderStore::new(&root);
    let report = process_indicator_bank(&store, &store, &config, Local::now().date_naive())?;

    println!("\n📊 Bank now holds {} indicators", report.table.len());
    for view in ReportView::ALL {
        println!("   {:<18} {}", view.sheet_name(), view.filter(&report.log).len());
    }

    let failures = ReportView::Failures.filter(&report.log);
    if !failures.is_empty() {
        println!("\n⚠ Rejected fichas:");
        for entry in failures {
            println!("   {} -> {}", entry.source, entry.action);
        }
    }

    println!("\n✅ Bank written to {}", report.written.latest_snapshot);
    println!("✅ Dated copy: {}", report.written.dated_snapshot);
    println!("✅ Report: {}", report.written.report_workbook);

    Ok(())
}
