//! # Indicator Bank Builder
//!
//! A library for folding per-indicator scorecard workbooks ("fichas") into a
//! master indicator table ("the bank"), keyed by indicator code.
//!
//! ## Core Concepts
//!
//! - **Ficha**: a fixed-layout workbook describing one indicator, with twelve monthly measurements
//! - **Bank**: the master table, one row per indicator code, persisted as a spreadsheet snapshot
//! - **Periodicity**: the measurement cadence that decides how months roll up into an annual value
//! - **Manual overrides**: a curated workbook whose non-empty values win over ficha data
//! - **Summaries**: cross-tabulations of the final bank by area, status, periodicity, hierarchy and type
//!
//! ## Example
//!
//! ```rust,ignore
//! use indicator_bank_builder::*;
//! use chrono::NaiveDate;
//!
//! let store = LocalFolderStore::new("/srv/indicadores");
//! let config = BankConfig::for_year(2025);
//! let today = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
//!
//! let report = process_indicator_bank(&store, &store, &config, today).unwrap();
//! println!("{} indicators, {} fichas processed", report.table.len(), report.log.len());
//! ```

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod ficha;
pub mod normalize;
pub mod overrides;
pub mod record;
pub mod registry;
pub mod schema;
pub mod source;
pub mod summary;
pub mod workbook;

pub use aggregator::{annual_aggregate, AnnualAggregate};
pub use config::*;
pub use engine::FichaProcessor;
pub use error::{IndicatorBankError, Result};
pub use export::{bank_workbook_bytes, log_csv_bytes, report_workbook_bytes, ReportView};
pub use ficha::{FichaOutcome, FichaParser, ParsedFicha, SheetMatcher};
pub use overrides::{scrub_formula_cells, ManualOverrides};
pub use record::{FieldValue, IndicatorRecord, MonthlySeries, MonthlyValue};
pub use registry::{LogAction, MasterTable, ProcessingLogEntry, UpsertAction};
pub use schema::Periodicity;
pub use source::{
    discover_fichas, select_folder, DocumentEntry, DocumentKind, DocumentSink, DocumentSource,
    LocalFolderStore, MemoryStore,
};
pub use summary::{generate_summaries, BankSummaries, PivotCell, PivotTable};
pub use workbook::{RawCell, Sheet, Workbook};

use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use normalize::month_name;

/// Ids of the documents a run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocuments {
    pub latest_snapshot: String,
    pub dated_snapshot: String,
    pub report_workbook: String,
    pub report_csv: String,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub table: MasterTable,
    pub log: Vec<ProcessingLogEntry>,
    pub summaries: BankSummaries,
    pub written: WrittenDocuments,
}

pub struct IndicatorBankProcessor;

impl IndicatorBankProcessor {
    /// Loads the current bank, merges every ficha of `config.year`, applies
    /// manual overrides and writes the bank snapshots and processing report.
    pub fn run<S, K>(
        source: &S,
        sink: &K,
        config: &BankConfig,
        today: NaiveDate,
    ) -> Result<RunReport>
    where
        S: DocumentSource + ?Sized,
        K: DocumentSink + ?Sized,
    {
        config.validate()?;

        let year_folder =
            select_folder(source, &config.folders.bank_root, &config.year.to_string())?;
        let month_folder = select_folder(source, &year_folder.id, month_name(today.month()))?;
        info!("Bank folder for this run: {}", month_folder.id);

        let mut table = Self::load_bank(source, config, &month_folder.id)?;
        info!("Bank loaded with {} indicators", table.len());

        let fichas = discover_fichas(source, &config.folders.fichas_root, config.year)?;
        info!("Found {} fichas for {}", fichas.len(), config.year);

        let log = FichaProcessor::new(config).process_batch(source, &mut table, &fichas);

        if let Some(manual_id) = &config.folders.manual_file {
            let workbook = source.read_workbook(manual_id)?;
            ManualOverrides::from_workbook(&workbook, &config.manual)?.apply(&mut table)?;
        }
        scrub_formula_cells(&mut table);

        let summaries = generate_summaries(&table)?;
        let written = Self::write_outputs(
            source,
            sink,
            config,
            today,
            &month_folder.id,
            &table,
            &summaries,
            &log,
        )?;

        info!(
            "Run finished: {} indicators in bank, {} of {} fichas merged",
            table.len(),
            log.iter().filter(|e| e.ok).count(),
            log.len()
        );

        Ok(RunReport {
            table,
            log,
            summaries,
            written,
        })
    }

    /// Latest snapshot from the month folder, else from the bank root, else
    /// an empty table with the configured schema.
    pub fn load_bank<S: DocumentSource + ?Sized>(
        source: &S,
        config: &BankConfig,
        month_folder: &str,
    ) -> Result<MasterTable> {
        let name = &config.files.latest_snapshot;
        let snapshot = match source.find_file(month_folder, name)? {
            Some(doc) => Some(doc),
            None => source.find_file(&config.folders.bank_root, name)?,
        };

        match snapshot {
            Some(doc) => {
                debug!("Loading bank snapshot {}", doc.id);
                let workbook = source.read_workbook(&doc.id)?;
                MasterTable::from_workbook(&workbook, &config.columns)
            }
            None => {
                info!("No bank snapshot named {}, starting empty", name);
                MasterTable::with_schema(config)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_outputs<S, K>(
        source: &S,
        sink: &K,
        config: &BankConfig,
        today: NaiveDate,
        month_folder: &str,
        table: &MasterTable,
        summaries: &BankSummaries,
        log: &[ProcessingLogEntry],
    ) -> Result<WrittenDocuments>
    where
        S: DocumentSource + ?Sized,
        K: DocumentSink + ?Sized,
    {
        let files = &config.files;
        let report_folder = &config.folders.report_folder;

        let bank_bytes = bank_workbook_bytes(table, summaries)?;
        let latest_snapshot = sink.create_or_replace(
            &bank_bytes,
            existing_id(source, month_folder, &files.latest_snapshot).as_deref(),
            &files.latest_snapshot,
            month_folder,
        )?;
        let dated_snapshot = sink.create_or_replace(
            &bank_bytes,
            None,
            &files.dated_snapshot(today),
            month_folder,
        )?;

        let report_workbook = sink.create_or_replace(
            &report_workbook_bytes(log)?,
            existing_id(source, report_folder, &files.report_workbook).as_deref(),
            &files.report_workbook,
            report_folder,
        )?;
        let report_csv = sink.create_or_replace(
            &log_csv_bytes(log)?,
            existing_id(source, report_folder, &files.report_csv).as_deref(),
            &files.report_csv,
            report_folder,
        )?;

        debug!("Wrote {} and {}", latest_snapshot, dated_snapshot);
        Ok(WrittenDocuments {
            latest_snapshot,
            dated_snapshot,
            report_workbook,
            report_csv,
        })
    }
}

/// Id of `name` in `folder` when it can be found. A folder that does not
/// exist yet is treated as empty; any other listing failure is warned about,
/// since the write that follows creates a new document instead of replacing.
fn existing_id<S: DocumentSource + ?Sized>(
    source: &S,
    folder: &str,
    name: &str,
) -> Option<String> {
    match source.find_file(folder, name) {
        Ok(found) => found.map(|d| d.id),
        Err(IndicatorBankError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Folder {} does not exist yet, creating {}", folder, name);
            None
        }
        Err(e) => {
            warn!(
                "Could not look up {} in {}, a new copy will be written: {}",
                name, folder, e
            );
            None
        }
    }
}

pub fn process_indicator_bank<S, K>(
    source: &S,
    sink: &K,
    config: &BankConfig,
    today: NaiveDate,
) -> Result<RunReport>
where
    S: DocumentSource + ?Sized,
    K: DocumentSink + ?Sized,
{
    IndicatorBankProcessor::run(source, sink, config, today)
}
