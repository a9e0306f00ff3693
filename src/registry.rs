use crate::config::BankConfig;
use crate::error::{IndicatorBankError, Result};
use crate::normalize::{code_suffix_number, normalize_code};
use crate::record::{FieldValue, IndicatorRecord};
use crate::schema::{AREA, CODE};
use crate::workbook::Workbook;
use log::warn;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

pub type Row = Vec<Option<FieldValue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Added,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogAction {
    Added,
    Updated,
    CodeNotFound,
    Error(String),
}

impl From<UpsertAction> for LogAction {
    fn from(action: UpsertAction) -> Self {
        match action {
            UpsertAction::Added => LogAction::Added,
            UpsertAction::Updated => LogAction::Updated,
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogAction::Added => write!(f, "added"),
            LogAction::Updated => write!(f, "updated"),
            LogAction::CodeNotFound => write!(f, "code_not_found"),
            LogAction::Error(message) => write!(f, "error:{}", message),
        }
    }
}

impl Serialize for LogAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of one document in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingLogEntry {
    pub source: String,
    pub sheet: Option<String>,
    pub code: Option<String>,
    pub action: LogAction,
    pub ok: bool,
}

impl ProcessingLogEntry {
    pub fn merged(source: &str, sheet: &str, code: &str, action: UpsertAction) -> Self {
        Self {
            source: source.to_string(),
            sheet: Some(sheet.to_string()),
            code: Some(code.to_string()),
            action: action.into(),
            ok: true,
        }
    }

    pub fn code_not_found(source: &str, sheet: &str) -> Self {
        Self {
            source: source.to_string(),
            sheet: Some(sheet.to_string()),
            code: None,
            action: LogAction::CodeNotFound,
            ok: false,
        }
    }

    pub fn failed(source: &str, message: impl fmt::Display) -> Self {
        Self {
            source: source.to_string(),
            sheet: None,
            code: None,
            action: LogAction::Error(message.to_string()),
            ok: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MasterTable {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    rows: Vec<Row>,
    code_column: usize,
    index: HashMap<String, usize>,
}

impl MasterTable {
    /// Empty table with the given column order. The code column is mandatory.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), i).is_some() {
                return Err(IndicatorBankError::DuplicateColumn(column.clone()));
            }
        }
        let code_column = *positions
            .get(CODE)
            .ok_or_else(|| IndicatorBankError::MissingColumn(CODE.to_string()))?;

        Ok(Self {
            columns,
            positions,
            rows: Vec::new(),
            code_column,
            index: HashMap::new(),
        })
    }

    pub fn with_schema(config: &BankConfig) -> Result<Self> {
        Self::new(config.columns.clone())
    }

    /// Builds a table from persisted rows. Codes are normalized; when a code
    /// repeats, the first row wins and later ones are dropped.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::new(columns)?;
        for mut row in rows {
            if row.len() != table.columns.len() {
                return Err(IndicatorBankError::RowWidthMismatch {
                    expected: table.columns.len(),
                    found: row.len(),
                });
            }

            let code = row[table.code_column]
                .as_ref()
                .and_then(|v| normalize_code(&v.as_text()));
            row[table.code_column] = code.clone().map(FieldValue::Text);

            if let Some(code) = code {
                if table.index.contains_key(&code) {
                    warn!("Duplicate code {} in bank snapshot, keeping the first row", code);
                    continue;
                }
                table.index.insert(code, table.rows.len());
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Reads a persisted snapshot: first sheet, header row first. Schema
    /// columns missing from the snapshot are appended empty.
    pub fn from_workbook(workbook: &Workbook, schema: &[String]) -> Result<Self> {
        let mut grid = workbook.first_sheet()?.rows().into_iter();
        let Some(header) = grid.next() else {
            return Self::new(schema.to_vec());
        };

        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, cell)| cell.render().unwrap_or_else(|| format!("Unnamed: {}", i)))
            .collect();

        let rows: Vec<Row> = grid
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|cells| cells.iter().map(FieldValue::from_cell).collect())
            .collect();

        let mut table = Self::from_rows(columns, rows)?;
        table.ensure_columns(schema);
        Ok(table)
    }

    /// Appends any of `columns` the table does not have yet. Never removes or reorders.
    pub fn ensure_columns(&mut self, columns: &[String]) {
        for column in columns {
            if !self.positions.contains_key(column) {
                self.positions.insert(column.clone(), self.columns.len());
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(None);
                }
            }
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_position(column)
            .ok_or_else(|| IndicatorBankError::MissingColumn(column.to_string()))
    }

    pub fn row_index(&self, code: &str) -> Option<usize> {
        self.index.get(code).copied()
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn get(&self, code: &str, column: &str) -> Option<&FieldValue> {
        let row = self.row_index(code)?;
        let col = self.column_position(column)?;
        self.rows[row][col].as_ref()
    }

    pub fn code_at(&self, row: usize) -> Option<&str> {
        match self.rows.get(row)?.get(self.code_column)? {
            Some(FieldValue::Text(code)) => Some(code.as_str()),
            _ => None,
        }
    }

    /// Writes a cell. The code column is not writable this way.
    pub fn set_cell(&mut self, row: usize, col: usize, value: Option<FieldValue>) {
        if col == self.code_column {
            return;
        }
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value;
        }
    }

    /// Inserts or updates the row for `record.code`. Only columns present in
    /// the record are written; columns outside the schema are ignored.
    pub fn upsert(&mut self, record: &IndicatorRecord) -> UpsertAction {
        let (row_idx, action) = match self.index.get(&record.code) {
            Some(&idx) => (idx, UpsertAction::Updated),
            None => {
                let mut row: Row = vec![None; self.columns.len()];
                row[self.code_column] = Some(FieldValue::Text(record.code.clone()));
                self.rows.push(row);
                let idx = self.rows.len() - 1;
                self.index.insert(record.code.clone(), idx);
                (idx, UpsertAction::Added)
            }
        };

        for (column, value) in &record.fields {
            if let Some(&col) = self.positions.get(column) {
                self.set_cell(row_idx, col, value.clone());
            }
        }

        action
    }

    /// Orders rows by area (blank areas last), then by the numeric suffix of
    /// the code. The sort is stable.
    pub fn sort_canonical(&mut self) {
        let area_col = self.column_position(AREA);
        let code_col = self.code_column;

        let area_of = |row: &Row| area_col.and_then(|c| row[c].as_ref()).map(|v| v.as_text());
        let suffix_of = |row: &Row| {
            row[code_col]
                .as_ref()
                .map(|v| code_suffix_number(&v.as_text()))
                .unwrap_or(0)
        };

        self.rows.sort_by(|a, b| {
            let area_order = match (area_of(a), area_of(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            area_order.then_with(|| suffix_of(a).cmp(&suffix_of(b)))
        });
        self.rebuild_index();
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for i in 0..self.rows.len() {
            if let Some(code) = self.code_at(i).map(|c| c.to_string()) {
                self.index.entry(code).or_insert(i);
            }
        }
    }
}
