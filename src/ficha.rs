//! Scorecard ("ficha") parsing.
//!
//! A ficha is a workbook with one main sheet laid out at fixed coordinates and
//! an optional evaluation sheet. Workbooks in the wild carry extra sheets, so
//! the main sheet is located with an ordered list of [`SheetMatcher`]s.

use crate::config::{BankConfig, FichaLayout};
use crate::error::{IndicatorBankError, Result};
use crate::normalize::{clean_text, file_stem_lower, normalize_code, parse_decimal};
use crate::record::{FieldValue, IndicatorRecord, MonthlySeries, MonthlyValue};
use crate::workbook::{RawCell, Sheet, Workbook};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SheetMatcher {
    /// Sheet name contains a code-like token from the file name (`ind-ges-01`)
    CodeToken,
    /// Sheet name contains the whole file name without extension
    FileStem,
    /// First sheet mentioning one of the layout keywords (`ficha`, `indicador`)
    Keyword,
    FirstSheet,
}

impl SheetMatcher {
    pub const PRECEDENCE: [SheetMatcher; 4] = [
        SheetMatcher::CodeToken,
        SheetMatcher::FileStem,
        SheetMatcher::Keyword,
        SheetMatcher::FirstSheet,
    ];

    pub fn find<'a>(
        &self,
        workbook: &'a Workbook,
        file_name: &str,
        layout: &FichaLayout,
    ) -> Option<&'a Sheet> {
        let sheets = workbook.sheets();
        match self {
            SheetMatcher::CodeToken => {
                let tokens = code_like_tokens(file_name, &layout.code_token_marker);
                if tokens.is_empty() {
                    return None;
                }
                sheets.iter().find(|s| {
                    let name = s.name().to_lowercase();
                    tokens.iter().any(|t| name.contains(t.as_str()))
                })
            }
            SheetMatcher::FileStem => {
                let stem = file_stem_lower(file_name);
                sheets
                    .iter()
                    .find(|s| s.name().to_lowercase().contains(stem.as_str()))
            }
            SheetMatcher::Keyword => sheets.iter().find(|s| {
                let name = s.name().to_lowercase();
                layout
                    .sheet_keywords
                    .iter()
                    .any(|k| name.contains(k.to_lowercase().as_str()))
            }),
            SheetMatcher::FirstSheet => sheets.first(),
        }
    }
}

/// Whitespace-separated tokens of the lowercase file stem that contain both
/// `marker` and a hyphen.
pub fn code_like_tokens(file_name: &str, marker: &str) -> Vec<String> {
    let marker = marker.to_lowercase();
    file_stem_lower(file_name)
        .split_whitespace()
        .filter(|t| t.contains(marker.as_str()) && t.contains('-'))
        .map(|t| t.to_string())
        .collect()
}

pub fn resolve_sheet<'a>(
    workbook: &'a Workbook,
    file_name: &str,
    layout: &FichaLayout,
) -> Result<(&'a Sheet, SheetMatcher)> {
    SheetMatcher::PRECEDENCE
        .iter()
        .find_map(|m| m.find(workbook, file_name, layout).map(|s| (s, *m)))
        .ok_or(IndicatorBankError::EmptyWorkbook)
}

/// Interprets one monthly measurement cell.
///
/// Blank cells, `N/A` and anything carrying `#` (Excel error literals) are
/// missing. Text with `%` is a percentage as written; a plain number in
/// `(0, 1]` is an Excel fraction and is scaled to a percentage.
pub fn classify_month(cell: &RawCell) -> MonthlyValue {
    let number = match cell {
        RawCell::Empty | RawCell::DateTime(_) | RawCell::Error(_) => return MonthlyValue::Missing,
        RawCell::Number(n) => *n,
        RawCell::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        RawCell::Text(text) => {
            if text.trim().is_empty() || text.contains("N/A") || text.contains('#') {
                return MonthlyValue::Missing;
            }
            if text.contains('%') {
                let cleaned = text.replace('%', "").replace(',', ".");
                return match parse_decimal(&cleaned) {
                    Some(v) => MonthlyValue::Percentage(v),
                    None => MonthlyValue::Missing,
                };
            }
            match parse_decimal(text) {
                Some(v) => v,
                None => return MonthlyValue::Missing,
            }
        }
    };

    if number > 0.0 && number <= 1.0 {
        MonthlyValue::Percentage(number * 100.0)
    } else {
        MonthlyValue::Numeric(number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedFicha {
    pub sheet: String,
    pub matched_by: SheetMatcher,
    pub record: IndicatorRecord,
    pub months: MonthlySeries,
    /// Declared measurement periodicity as written on the sheet
    pub periodicity: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FichaOutcome {
    Parsed(ParsedFicha),
    CodeNotFound { sheet: String },
}

pub struct FichaParser<'a> {
    config: &'a BankConfig,
}

impl<'a> FichaParser<'a> {
    pub fn new(config: &'a BankConfig) -> Self {
        Self { config }
    }

    pub fn parse(&self, workbook: &Workbook, file_name: &str) -> Result<FichaOutcome> {
        let layout = &self.config.layout;
        let (sheet, matched_by) = resolve_sheet(workbook, file_name, layout)?;
        debug!(
            "{}: using sheet '{}' ({:?})",
            file_name,
            sheet.name(),
            matched_by
        );

        let Some(code) = self.extract_code(sheet)? else {
            return Ok(FichaOutcome::CodeNotFound {
                sheet: sheet.name().to_string(),
            });
        };

        let mut record = IndicatorRecord::new(code);
        self.extract_fields(sheet, &mut record)?;

        let months = self.extract_months(sheet)?;
        for (column, value) in self.config.month_columns.iter().zip(months.rendered()) {
            record.set(column.clone(), Some(value));
        }

        let periodicity = clean_text(sheet.get_a1(&layout.periodicity_cell)?);

        self.overlay_evaluation(workbook, &mut record)?;

        Ok(FichaOutcome::Parsed(ParsedFicha {
            sheet: sheet.name().to_string(),
            matched_by,
            record,
            months,
            periodicity,
        }))
    }

    /// First non-empty candidate cell, normalized; `None` unless it carries the code prefix.
    pub fn extract_code(&self, sheet: &Sheet) -> Result<Option<String>> {
        for cell in &self.config.layout.code_cells {
            if let Some(text) = clean_text(sheet.get_a1(cell)?) {
                let code = normalize_code(&text);
                return Ok(code.filter(|c| c.starts_with(self.config.code_prefix.as_str())));
            }
        }
        Ok(None)
    }

    fn extract_fields(&self, sheet: &Sheet, record: &mut IndicatorRecord) -> Result<()> {
        let layout = &self.config.layout;

        for field in &layout.fields {
            record.set_text(field.column.clone(), clean_text(sheet.get_a1(&field.cell)?));
        }

        let numerator = clean_text(sheet.get_a1(&layout.formula.numerator_cell)?);
        let denominator = clean_text(sheet.get_a1(&layout.formula.denominator_cell)?);
        let formula = match (numerator, denominator) {
            (None, None) => None,
            (n, d) => Some(format!(
                "{} / {}",
                n.unwrap_or_default(),
                d.unwrap_or_default()
            )),
        };
        record.set_text(layout.formula.column.clone(), formula);

        Ok(())
    }

    pub fn extract_months(&self, sheet: &Sheet) -> Result<MonthlySeries> {
        let values = self
            .config
            .layout
            .month_cells
            .iter()
            .map(|cell| sheet.get_a1(cell).map(classify_month))
            .collect::<Result<Vec<_>>>()?;
        Ok(MonthlySeries::new(values))
    }

    fn overlay_evaluation(&self, workbook: &Workbook, record: &mut IndicatorRecord) -> Result<()> {
        let evaluation = &self.config.layout.evaluation;
        let marker = evaluation.sheet_marker.to_lowercase();
        let Some(sheet) = workbook
            .sheets()
            .iter()
            .find(|s| s.name().to_lowercase().contains(marker.as_str()))
        else {
            return Ok(());
        };

        for field in &evaluation.fields {
            let value = clean_text(sheet.get_a1(&field.cell)?).map(FieldValue::Text);
            record.set(field.column.clone(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;

    fn ficha_sheet(name: &str, code: &str) -> Sheet {
        let mut sheet = Sheet::new(name);
        sheet.set_a1("L5", code).unwrap();
        sheet.set_a1("C5", "Rotación de personal").unwrap();
        sheet.set_a1("C7", " Talento Humano ").unwrap();
        sheet.set_a1("C9", "Retiros").unwrap();
        sheet.set_a1("H9", "Planta promedio").unwrap();
        sheet.set_a1("C11", "Mensual").unwrap();
        sheet
    }

    #[test]
    fn test_code_like_tokens() {
        let tokens = code_like_tokens("Ficha IND-GES-01 rotacion.xlsx", "ind");
        assert_eq!(tokens, vec!["ind-ges-01"]);
        assert!(code_like_tokens("indicadores 2025.xlsx", "ind").is_empty());
    }

    #[test]
    fn test_resolve_code_token_then_stem() {
        let layout = FichaLayout::default();
        let wb = Workbook::new()
            .with_sheet(Sheet::new("Ficha tecnica"))
            .with_sheet(Sheet::new("IND-GES-01"));
        let (sheet, matcher) = resolve_sheet(&wb, "Rotacion IND-GES-01.xlsx", &layout).unwrap();
        assert_eq!(sheet.name(), "IND-GES-01");
        assert_eq!(matcher, SheetMatcher::CodeToken);

        let wb = Workbook::new()
            .with_sheet(Sheet::new("Portada"))
            .with_sheet(Sheet::new("Rotacion Personal 2025"));
        let (sheet, matcher) = resolve_sheet(&wb, "rotacion personal.xlsx", &layout).unwrap();
        assert_eq!(sheet.name(), "Rotacion Personal 2025");
        assert_eq!(matcher, SheetMatcher::FileStem);
    }

    #[test]
    fn test_resolve_keyword_then_first_sheet() {
        let layout = FichaLayout::default();
        let wb = Workbook::new()
            .with_sheet(Sheet::new("Portada"))
            .with_sheet(Sheet::new("FICHA TECNICA"));
        let (sheet, matcher) = resolve_sheet(&wb, "otro.xlsx", &layout).unwrap();
        assert_eq!(sheet.name(), "FICHA TECNICA");
        assert_eq!(matcher, SheetMatcher::Keyword);

        let wb = Workbook::new()
            .with_sheet(Sheet::new("Hoja1"))
            .with_sheet(Sheet::new("Hoja2"));
        let (sheet, matcher) = resolve_sheet(&wb, "otro.xlsx", &layout).unwrap();
        assert_eq!(sheet.name(), "Hoja1");
        assert_eq!(matcher, SheetMatcher::FirstSheet);

        assert!(resolve_sheet(&Workbook::new(), "otro.xlsx", &layout).is_err());
    }

    #[test]
    fn test_classify_month() {
        assert_eq!(classify_month(&RawCell::Empty), MonthlyValue::Missing);
        assert_eq!(classify_month(&"N/A".into()), MonthlyValue::Missing);
        assert_eq!(classify_month(&"#DIV/0!".into()), MonthlyValue::Missing);
        assert_eq!(
            classify_month(&RawCell::Error("#REF!".to_string())),
            MonthlyValue::Missing
        );
        assert_eq!(classify_month(&"85,5%".into()), MonthlyValue::Percentage(85.5));
        assert_eq!(classify_month(&RawCell::Number(0.85)), MonthlyValue::Percentage(85.0));
        assert_eq!(classify_month(&RawCell::Number(1.0)), MonthlyValue::Percentage(100.0));
        assert_eq!(classify_month(&RawCell::Number(0.0)), MonthlyValue::Numeric(0.0));
        assert_eq!(classify_month(&RawCell::Number(42.0)), MonthlyValue::Numeric(42.0));
        assert_eq!(classify_month(&" 12 ".into()), MonthlyValue::Numeric(12.0));
        assert_eq!(classify_month(&"pendiente".into()), MonthlyValue::Missing);
    }

    #[test]
    fn test_parse_extracts_fields_and_months() {
        let config = BankConfig::for_year(2025);
        let mut sheet = ficha_sheet("Ficha", " ind-ges-01 ");
        sheet.set_a1("B19", 0.85).unwrap();
        sheet.set_a1("C19", "N/A").unwrap();
        sheet.set_a1("D19", 90.0).unwrap();
        let wb = Workbook::new().with_sheet(sheet);

        let outcome = FichaParser::new(&config).parse(&wb, "rotacion.xlsx").unwrap();
        let FichaOutcome::Parsed(parsed) = outcome else {
            panic!("expected a parsed ficha");
        };

        let record = &parsed.record;
        assert_eq!(record.code, "IND-GES-01");
        assert_eq!(record.get(AREA), Some(&FieldValue::text("Talento Humano")));
        assert_eq!(
            record.get(FORMULA),
            Some(&FieldValue::text("Retiros / Planta promedio"))
        );
        assert!(record.fields.contains_key(OBSERVATIONS));
        assert_eq!(record.get(OBSERVATIONS), None);
        assert_eq!(record.get("ene-25"), Some(&FieldValue::text("85.00%")));
        assert_eq!(record.get("feb-25"), Some(&FieldValue::text("N/A")));
        assert_eq!(record.get("mar-25"), Some(&FieldValue::text("90.00%")));
        assert_eq!(record.get("abr-25"), Some(&FieldValue::text("N/A")));
        assert!(parsed.months.percentage_mode());
        assert_eq!(parsed.periodicity.as_deref(), Some("Mensual"));
    }

    #[test]
    fn test_code_falls_back_to_second_cell() {
        let config = BankConfig::for_year(2025);
        let mut sheet = Sheet::new("Ficha");
        sheet.set_a1("M5", "IND-CAL-7").unwrap();
        let parser = FichaParser::new(&config);
        assert_eq!(parser.extract_code(&sheet).unwrap().as_deref(), Some("IND-CAL-7"));
    }

    #[test]
    fn test_code_without_prefix_is_rejected() {
        let config = BankConfig::for_year(2025);
        let wb = Workbook::new().with_sheet(ficha_sheet("Ficha", "GES-01"));
        let outcome = FichaParser::new(&config).parse(&wb, "x.xlsx").unwrap();
        assert_eq!(
            outcome,
            FichaOutcome::CodeNotFound {
                sheet: "Ficha".to_string()
            }
        );

        let wb = Workbook::new().with_sheet(Sheet::new("Ficha"));
        let outcome = FichaParser::new(&config).parse(&wb, "x.xlsx").unwrap();
        assert!(matches!(outcome, FichaOutcome::CodeNotFound { .. }));
    }

    #[test]
    fn test_evaluation_overlay() {
        let config = BankConfig::for_year(2025);
        let mut eval = Sheet::new("Evaluación");
        eval.set_a1("A1", "ESTADO").unwrap();
        eval.set_a1("A2", "Activo").unwrap();
        eval.set_a1("B2", "Normativo").unwrap();
        eval.set_a1("E2", "SI").unwrap();
        let wb = Workbook::new()
            .with_sheet(ficha_sheet("Ficha", "IND-GES-01"))
            .with_sheet(eval);

        let FichaOutcome::Parsed(parsed) =
            FichaParser::new(&config).parse(&wb, "x.xlsx").unwrap()
        else {
            panic!("expected a parsed ficha");
        };
        assert_eq!(parsed.record.get(STATUS), Some(&FieldValue::text("Activo")));
        assert_eq!(parsed.record.get(ORIGIN), Some(&FieldValue::text("Normativo")));
        assert_eq!(parsed.record.get(REVIEWED), Some(&FieldValue::text("SI")));
        assert!(parsed.record.fields.contains_key(DOCUMENTED));
    }

    #[test]
    fn test_formula_absent_when_both_sides_blank() {
        let config = BankConfig::for_year(2025);
        let mut sheet = Sheet::new("Ficha");
        sheet.set_a1("L5", "IND-GES-02").unwrap();
        let wb = Workbook::new().with_sheet(sheet);
        let FichaOutcome::Parsed(parsed) =
            FichaParser::new(&config).parse(&wb, "x.xlsx").unwrap()
        else {
            panic!("expected a parsed ficha");
        };
        assert!(parsed.record.fields.contains_key(FORMULA));
        assert_eq!(parsed.record.get(FORMULA), None);
    }
}
