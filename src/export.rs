use crate::error::Result;
use crate::record::FieldValue;
use crate::registry::{LogAction, MasterTable, ProcessingLogEntry};
use crate::summary::{BankSummaries, PivotCell, PivotTable};
use crate::workbook::{RawCell, Workbook};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Worksheet};

pub const BANK_SHEET: &str = "Banco";

const LOG_HEADERS: [&str; 5] = ["source", "sheet", "code", "action", "ok"];

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x00A7_D08C))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

fn body_format() -> Format {
    Format::new()
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

fn write_header(worksheet: &mut Worksheet, headers: &[&str], format: &Format) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, format)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Serializes an in-memory workbook cell by cell, without styling.
pub fn workbook_to_bytes(workbook: &Workbook) -> Result<Vec<u8>> {
    let mut out = rust_xlsxwriter::Workbook::new();
    for sheet in workbook.sheets() {
        let worksheet = out.add_worksheet();
        worksheet.set_name(sheet.name())?;
        for (row, cells) in sheet.rows().iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                let (row, col) = (row as u32, col as u16);
                match cell {
                    RawCell::Empty => {}
                    RawCell::Text(s) | RawCell::Error(s) => {
                        worksheet.write_string(row, col, s)?;
                    }
                    RawCell::Number(n) | RawCell::DateTime(n) => {
                        worksheet.write_number(row, col, *n)?;
                    }
                    RawCell::Bool(b) => {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                }
            }
        }
    }
    Ok(out.save_to_buffer()?)
}

fn write_table(worksheet: &mut Worksheet, table: &MasterTable) -> Result<()> {
    let header = header_format();
    let body = body_format();

    let headers: Vec<&str> = table.columns().iter().map(|c| c.as_str()).collect();
    write_header(worksheet, &headers, &header)?;

    for (i, row) in table.rows().iter().enumerate() {
        let r = i as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Some(FieldValue::Number(n)) => {
                    worksheet.write_number_with_format(r, col, *n, &body)?;
                }
                Some(FieldValue::Text(s)) => {
                    worksheet.write_string_with_format(r, col, s, &body)?;
                }
                None => {
                    worksheet.write_blank(r, col, &body)?;
                }
            }
        }
    }

    for col in 0..headers.len() {
        worksheet.set_column_width(col as u16, 18)?;
    }
    Ok(())
}

fn write_pivot(worksheet: &mut Worksheet, pivot: &PivotTable) -> Result<()> {
    let header = header_format();
    let total = Format::new().set_bold().set_border(FormatBorder::Thin);
    let body = Format::new().set_border(FormatBorder::Thin);

    let mut headers = vec![pivot.index_header.as_str()];
    headers.extend(pivot.columns.iter().map(|c| c.as_str()));
    write_header(worksheet, &headers, &header)?;

    let last = pivot.rows.len().saturating_sub(1);
    for (i, row) in pivot.rows.iter().enumerate() {
        let r = i as u32 + 1;
        let format = if i == last && pivot.rows.len() > 1 { &total } else { &body };
        worksheet.write_string_with_format(r, 0, &row.label, format)?;
        for (col, cell) in row.cells.iter().enumerate() {
            let col = col as u16 + 1;
            match cell {
                PivotCell::Count(n) => {
                    worksheet.write_number_with_format(r, col, *n as f64, format)?;
                }
                PivotCell::Codes(codes) => {
                    worksheet.write_string_with_format(r, col, codes, format)?;
                }
                PivotCell::Blank => {
                    worksheet.write_blank(r, col, format)?;
                }
            }
        }
    }

    worksheet.set_column_width(0, 28)?;
    Ok(())
}

/// The bank sheet followed by one sheet per summary.
pub fn bank_workbook_bytes(table: &MasterTable, summaries: &BankSummaries) -> Result<Vec<u8>> {
    let mut workbook = rust_xlsxwriter::Workbook::new();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(BANK_SHEET)?;
    write_table(worksheet, table)?;

    for (name, pivot) in summaries.sheets() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        write_pivot(worksheet, pivot)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Filtered views of a processing log, one per report sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportView {
    Full,
    Updated,
    Added,
    Failures,
}

impl ReportView {
    pub const ALL: [ReportView; 4] = [
        ReportView::Full,
        ReportView::Updated,
        ReportView::Added,
        ReportView::Failures,
    ];

    pub fn sheet_name(&self) -> &'static str {
        match self {
            ReportView::Full => "Reporte Completo",
            ReportView::Updated => "Actualizados",
            ReportView::Added => "Agregados",
            ReportView::Failures => "Errores",
        }
    }

    pub fn includes(&self, entry: &ProcessingLogEntry) -> bool {
        match self {
            ReportView::Full => true,
            ReportView::Updated => entry.action == LogAction::Updated,
            ReportView::Added => entry.action == LogAction::Added,
            ReportView::Failures => !entry.ok,
        }
    }

    pub fn filter<'a>(&self, log: &'a [ProcessingLogEntry]) -> Vec<&'a ProcessingLogEntry> {
        log.iter().filter(|e| self.includes(e)).collect()
    }
}

pub fn report_workbook_bytes(log: &[ProcessingLogEntry]) -> Result<Vec<u8>> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let header = header_format();

    for view in ReportView::ALL {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(view.sheet_name())?;
        write_header(worksheet, &LOG_HEADERS, &header)?;

        for (i, entry) in view.filter(log).into_iter().enumerate() {
            let r = i as u32 + 1;
            worksheet.write_string(r, 0, &entry.source)?;
            if let Some(sheet) = &entry.sheet {
                worksheet.write_string(r, 1, sheet)?;
            }
            if let Some(code) = &entry.code {
                worksheet.write_string(r, 2, code)?;
            }
            worksheet.write_string(r, 3, entry.action.to_string())?;
            worksheet.write_boolean(r, 4, entry.ok)?;
        }
        worksheet.set_column_width(0, 40)?;
        worksheet.set_column_width(3, 30)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Full log as CSV with a header row, also when the log is empty.
pub fn log_csv_bytes(log: &[ProcessingLogEntry]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(LOG_HEADERS)?;
    for entry in log {
        writer.serialize(entry)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::error::IndicatorBankError::IoError(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BankConfig;
    use crate::record::IndicatorRecord;
    use crate::registry::UpsertAction;
    use crate::schema::*;
    use crate::summary::generate_summaries;
    use crate::workbook::Sheet;

    fn log() -> Vec<ProcessingLogEntry> {
        vec![
            ProcessingLogEntry::merged("a.xlsx", "Ficha", "IND-GES-1", UpsertAction::Added),
            ProcessingLogEntry::merged("b.xlsx", "Ficha", "IND-GES-2", UpsertAction::Updated),
            ProcessingLogEntry::code_not_found("c.xlsx", "Hoja1"),
            ProcessingLogEntry::failed("d.xlsx", "bad zip"),
        ]
    }

    #[test]
    fn test_report_views() {
        let log = log();
        assert_eq!(ReportView::Full.filter(&log).len(), 4);
        assert_eq!(ReportView::Updated.filter(&log)[0].source, "b.xlsx");
        assert_eq!(ReportView::Added.filter(&log)[0].source, "a.xlsx");
        let failures: Vec<&str> = ReportView::Failures
            .filter(&log)
            .iter()
            .map(|e| e.source.as_str())
            .collect();
        assert_eq!(failures, vec!["c.xlsx", "d.xlsx"]);
    }

    #[test]
    fn test_log_csv() {
        let csv = String::from_utf8(log_csv_bytes(&log()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "source,sheet,code,action,ok");
        assert_eq!(lines[1], "a.xlsx,Ficha,IND-GES-1,added,true");
        assert_eq!(lines[3], "c.xlsx,Hoja1,,code_not_found,false");
        assert_eq!(lines[4], "d.xlsx,,,error:bad zip,false");

        let empty = String::from_utf8(log_csv_bytes(&[]).unwrap()).unwrap();
        assert_eq!(empty.trim_end(), "source,sheet,code,action,ok");
    }

    #[test]
    fn test_report_workbook_sheets() {
        let bytes = report_workbook_bytes(&log()).unwrap();
        let wb = Workbook::from_xlsx_bytes(&bytes).unwrap();
        assert_eq!(
            wb.sheet_names(),
            vec!["Reporte Completo", "Actualizados", "Agregados", "Errores"]
        );
        let errors = wb.sheet("Errores").unwrap();
        assert_eq!(errors.get_a1("A3").unwrap(), &RawCell::from("d.xlsx"));
        assert_eq!(errors.get_a1("D3").unwrap(), &RawCell::from("error:bad zip"));
    }

    #[test]
    fn test_bank_workbook_reads_back() {
        let config = BankConfig::for_year(2025);
        let mut table = MasterTable::with_schema(&config).unwrap();
        table.upsert(
            &IndicatorRecord::new("IND-GES-1")
                .with(AREA, "Gestión")
                .with(ANNUAL_VALUE, 42.5),
        );
        let summaries = generate_summaries(&table).unwrap();
        let bytes = bank_workbook_bytes(&table, &summaries).unwrap();

        let wb = Workbook::from_xlsx_bytes(&bytes).unwrap();
        assert_eq!(wb.sheet_names()[0], BANK_SHEET);
        assert_eq!(wb.sheets().len(), 7);

        let reloaded = MasterTable::from_workbook(&wb, &config.columns).unwrap();
        assert_eq!(reloaded.columns(), table.columns());
        assert_eq!(
            reloaded.get("IND-GES-1", ANNUAL_VALUE),
            Some(&FieldValue::Number(42.5))
        );
        assert_eq!(
            reloaded.get("IND-GES-1", AREA),
            Some(&FieldValue::text("Gestión"))
        );
    }

    #[test]
    fn test_plain_workbook_roundtrip() {
        let mut sheet = Sheet::new("Ficha");
        sheet.set_a1("L5", "IND-GES-1").unwrap();
        sheet.set_a1("B19", 0.85).unwrap();
        let bytes = workbook_to_bytes(&Workbook::new().with_sheet(sheet)).unwrap();

        let wb = Workbook::from_xlsx_bytes(&bytes).unwrap();
        let sheet = wb.sheet("Ficha").unwrap();
        assert_eq!(sheet.get_a1("L5").unwrap(), &RawCell::from("IND-GES-1"));
        assert_eq!(sheet.get_a1("B19").unwrap(), &RawCell::Number(0.85));
    }
}
