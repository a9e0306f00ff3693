use crate::aggregator::annual_aggregate;
use crate::config::BankConfig;
use crate::error::Result;
use crate::ficha::{FichaOutcome, FichaParser};
use crate::normalize::has_workbook_extension;
use crate::registry::{MasterTable, ProcessingLogEntry};
use crate::schema::ANNUAL_VALUE;
use crate::source::{DocumentEntry, DocumentSource};
use crate::workbook::Workbook;
use log::{debug, info, warn};

/// Folds fichas into the bank one document at a time.
pub struct FichaProcessor<'a> {
    config: &'a BankConfig,
}

impl<'a> FichaProcessor<'a> {
    pub fn new(config: &'a BankConfig) -> Self {
        Self { config }
    }

    /// Parses, aggregates and upserts one workbook. Any failure becomes a
    /// failed log entry; the table is only touched on success.
    pub fn process_document(
        &self,
        table: &mut MasterTable,
        source_name: &str,
        workbook: &Workbook,
    ) -> ProcessingLogEntry {
        match self.merge_document(table, source_name, workbook) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to process {}: {}", source_name, e);
                ProcessingLogEntry::failed(source_name, e)
            }
        }
    }

    fn merge_document(
        &self,
        table: &mut MasterTable,
        source_name: &str,
        workbook: &Workbook,
    ) -> Result<ProcessingLogEntry> {
        let parsed = match FichaParser::new(self.config).parse(workbook, source_name)? {
            FichaOutcome::Parsed(parsed) => parsed,
            FichaOutcome::CodeNotFound { sheet } => {
                warn!("{}: no valid indicator code on sheet '{}'", source_name, sheet);
                return Ok(ProcessingLogEntry::code_not_found(source_name, &sheet));
            }
        };

        let mut record = parsed.record;
        let aggregate = annual_aggregate(&parsed.months, parsed.periodicity.as_deref());
        record.set(ANNUAL_VALUE, Some(aggregate.to_field_value()));
        record.retain_columns(table.columns());

        let action = table.upsert(&record);
        debug!(
            "{}: {} {:?} from sheet '{}'",
            source_name, record.code, action, parsed.sheet
        );

        Ok(ProcessingLogEntry::merged(
            source_name,
            &parsed.sheet,
            &record.code,
            action,
        ))
    }

    /// Processes every workbook document in order, then sorts the table.
    /// Documents without a workbook extension are skipped without a log entry.
    pub fn process_batch<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
        table: &mut MasterTable,
        documents: &[DocumentEntry],
    ) -> Vec<ProcessingLogEntry> {
        let mut log = Vec::with_capacity(documents.len());

        for doc in documents {
            if !has_workbook_extension(&doc.name) {
                debug!("Skipping {}: not a workbook", doc.name);
                continue;
            }

            let entry = match source.read_workbook(&doc.id) {
                Ok(workbook) => self.process_document(table, &doc.name, &workbook),
                Err(e) => {
                    warn!("Could not read {}: {}", doc.name, e);
                    ProcessingLogEntry::failed(&doc.name, e)
                }
            };
            log.push(entry);
        }

        table.sort_canonical();

        let merged = log.iter().filter(|e| e.ok).count();
        info!(
            "Processed {} fichas: {} merged, {} rejected",
            log.len(),
            merged,
            log.len() - merged
        );
        log
    }
}
