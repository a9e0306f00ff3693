use crate::error::{IndicatorBankError, Result};
use crate::normalize::month_labels;
use crate::schema::*;
use crate::workbook::CellRef;
use chrono::{Datelike, Local, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FieldCell {
    #[schemars(description = "Bank column the value is written to")]
    pub column: String,

    #[schemars(description = "A1 reference of the source cell (e.g. 'C5')")]
    pub cell: String,
}

impl FieldCell {
    pub fn new(column: &str, cell: &str) -> Self {
        Self {
            column: column.to_string(),
            cell: cell.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FormulaCells {
    pub column: String,
    pub numerator_cell: String,
    pub denominator_cell: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct EvaluationLayout {
    #[schemars(description = "Case-insensitive substring identifying the evaluation sheet")]
    pub sheet_marker: String,

    #[schemars(description = "Cells of the first data row and the bank columns they overwrite")]
    pub fields: Vec<FieldCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FichaLayout {
    #[schemars(description = "Candidate cells holding the indicator code, tried in order")]
    pub code_cells: Vec<String>,

    #[schemars(
        description = "Lowercase marker a filename token must contain (along with a hyphen) to be treated as a code-like token"
    )]
    pub code_token_marker: String,

    #[schemars(description = "Lowercase keywords for the fallback sheet match")]
    pub sheet_keywords: Vec<String>,

    pub fields: Vec<FieldCell>,

    pub formula: FormulaCells,

    #[schemars(description = "Cell holding the declared measurement periodicity")]
    pub periodicity_cell: String,

    #[schemars(description = "Twelve cells, January to December, holding the monthly measurements")]
    pub month_cells: Vec<String>,

    pub evaluation: EvaluationLayout,
}

impl Default for FichaLayout {
    fn default() -> Self {
        Self {
            code_cells: vec!["L5".to_string(), "M5".to_string()],
            code_token_marker: "ind".to_string(),
            sheet_keywords: vec!["ficha".to_string(), "indicador".to_string()],
            fields: vec![
                FieldCell::new(NAME, "C5"),
                FieldCell::new(HIERARCHY, "I5"),
                FieldCell::new(PROCESS, "H7"),
                FieldCell::new(DESCRIPTION, "C6"),
                FieldCell::new(AREA, "C7"),
                FieldCell::new(INDICATOR_TYPE, "C8"),
                FieldCell::new(TREND, "L8"),
                FieldCell::new(NUMERATOR_SOURCE, "C10"),
                FieldCell::new(DENOMINATOR_SOURCE, "H10"),
                FieldCell::new(MEASUREMENT_PERIODICITY, "C11"),
                FieldCell::new(ANALYSIS_PERIODICITY, "C12"),
                FieldCell::new(OBSERVATIONS, "C13"),
                FieldCell::new(RELATED_STANDARD, "L9"),
                FieldCell::new(THRESHOLD_CRITICAL, "K11"),
                FieldCell::new(THRESHOLD_ACCEPTABLE, "L11"),
                FieldCell::new(THRESHOLD_SATISFACTORY, "M11"),
                FieldCell::new(RATING, "O19"),
            ],
            formula: FormulaCells {
                column: FORMULA.to_string(),
                numerator_cell: "C9".to_string(),
                denominator_cell: "H9".to_string(),
            },
            periodicity_cell: "C11".to_string(),
            month_cells: [
                "B19", "C19", "D19", "E19", "F19", "G19", "H19", "I19", "J19", "K19", "L19", "M19",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            evaluation: EvaluationLayout {
                sheet_marker: "eval".to_string(),
                fields: vec![
                    FieldCell::new(STATUS, "A2"),
                    FieldCell::new(ORIGIN, "B2"),
                    FieldCell::new(DOCUMENTED, "C2"),
                    FieldCell::new(CONTRACT_REVIEWED, "D2"),
                    FieldCell::new(REVIEWED, "E2"),
                ],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ManualOverrideLayout {
    #[schemars(description = "Header of the code column in the manual workbook")]
    pub code_column: String,

    #[schemars(description = "Bank columns that a non-empty manual value overwrites")]
    pub columns: Vec<String>,
}

impl Default for ManualOverrideLayout {
    fn default() -> Self {
        Self {
            code_column: "Cod. Indicador".to_string(),
            columns: [STATUS, ORIGIN, DOCUMENTED, CONTRACT_REVIEWED, REVIEWED]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FolderConfig {
    #[schemars(description = "Folder holding one subfolder per area, each with one subfolder per year")]
    pub fichas_root: String,

    #[schemars(description = "Folder holding year/month subfolders where bank snapshots are written")]
    pub bank_root: String,

    pub report_folder: String,

    #[serde(default)]
    #[schemars(description = "Document id of the manually curated override workbook, if any")]
    pub manual_file: Option<String>,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            fichas_root: "fichas".to_string(),
            bank_root: "banco".to_string(),
            report_folder: "reportes".to_string(),
            manual_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FileNames {
    pub latest_snapshot: String,
    pub dated_snapshot_prefix: String,
    pub report_workbook: String,
    pub report_csv: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            latest_snapshot: "Banco_Indicadores_BASE.xlsx".to_string(),
            dated_snapshot_prefix: "Banco_Indicadores".to_string(),
            report_workbook: "Reporte_Indicadores.xlsx".to_string(),
            report_csv: "Reporte_Indicadores.csv".to_string(),
        }
    }
}

impl FileNames {
    pub fn dated_snapshot(&self, date: NaiveDate) -> String {
        format!(
            "{}_{}.xlsx",
            self.dated_snapshot_prefix,
            date.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BankConfig {
    #[schemars(description = "Year whose scorecards are processed; drives month labels and folder selection")]
    pub year: i32,

    #[schemars(description = "Prefix every valid indicator code starts with")]
    pub code_prefix: String,

    #[schemars(description = "Ordered master table schema")]
    pub columns: Vec<String>,

    #[schemars(description = "Bank columns for the twelve month cells, January to December")]
    pub month_columns: Vec<String>,

    #[serde(default)]
    pub layout: FichaLayout,

    #[serde(default)]
    pub manual: ManualOverrideLayout,

    #[serde(default)]
    pub folders: FolderConfig,

    #[serde(default)]
    pub files: FileNames,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self::for_year(Local::now().year())
    }
}

impl BankConfig {
    pub fn for_year(year: i32) -> Self {
        Self {
            year,
            code_prefix: "IND-".to_string(),
            columns: bank_columns(year),
            month_columns: month_labels(year),
            layout: FichaLayout::default(),
            manual: ManualOverrideLayout::default(),
            folders: FolderConfig::default(),
            files: FileNames::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: BankConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BankConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn validate(&self) -> Result<()> {
        if self.layout.month_cells.len() != 12 {
            return Err(IndicatorBankError::InvalidConfig(format!(
                "expected 12 month cells, got {}",
                self.layout.month_cells.len()
            )));
        }
        if self.month_columns.len() != self.layout.month_cells.len() {
            return Err(IndicatorBankError::InvalidConfig(format!(
                "{} month columns for {} month cells",
                self.month_columns.len(),
                self.layout.month_cells.len()
            )));
        }
        if self.layout.code_cells.is_empty() {
            return Err(IndicatorBankError::InvalidConfig(
                "at least one code cell is required".to_string(),
            ));
        }
        if !self.columns.iter().any(|c| c == CODE) {
            return Err(IndicatorBankError::MissingColumn(CODE.to_string()));
        }

        let layout = &self.layout;
        let cells = layout
            .code_cells
            .iter()
            .chain(layout.month_cells.iter())
            .chain(layout.fields.iter().map(|f| &f.cell))
            .chain(layout.evaluation.fields.iter().map(|f| &f.cell))
            .chain([
                &layout.periodicity_cell,
                &layout.formula.numerator_cell,
                &layout.formula.denominator_cell,
            ]);
        for cell in cells {
            CellRef::parse(cell)?;
        }

        Ok(())
    }
}
