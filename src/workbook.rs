use crate::error::{IndicatorBankError, Result};
use crate::normalize::format_number;
use calamine::{Data, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

static EMPTY_CELL: RawCell = RawCell::Empty;

#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date value
    DateTime(f64),
    /// Error literal such as `#DIV/0!`
    Error(String),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }

    /// Text form of the cell, or `None` for an empty cell.
    pub fn render(&self) -> Option<String> {
        match self {
            RawCell::Empty => None,
            RawCell::Text(s) => Some(s.clone()),
            RawCell::Number(n) => Some(format_number(*n)),
            RawCell::DateTime(serial) => Some(
                serial_to_datetime(*serial)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| format_number(*serial)),
            ),
            RawCell::Bool(true) => Some("True".to_string()),
            RawCell::Bool(false) => Some("False".to_string()),
            RawCell::Error(e) => Some(e.clone()),
        }
    }
}

/// Excel serial date (1900 system, day 0 = 1899-12-30) to a timestamp,
/// rounded to the millisecond.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::Text(value.to_string())
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        RawCell::Text(value)
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl From<&Data> for RawCell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => RawCell::Empty,
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Float(f) => RawCell::Number(*f),
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Bool(b) => RawCell::Bool(*b),
            Data::DateTime(dt) => RawCell::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
            Data::Error(e) => RawCell::Error(e.to_string()),
        }
    }
}

/// Zero-based cell coordinate, written and parsed in A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn parse(a1: &str) -> Result<Self> {
        let trimmed = a1.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| IndicatorBankError::InvalidCellRef(a1.to_string()))?;
        let (letters, digits) = trimmed.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(IndicatorBankError::InvalidCellRef(a1.to_string()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
            col = col
                .checked_mul(26)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| IndicatorBankError::InvalidCellRef(a1.to_string()))?;
        }

        let row: u32 = digits
            .parse()
            .map_err(|_| IndicatorBankError::InvalidCellRef(a1.to_string()))?;
        if row == 0 {
            return Err(IndicatorBankError::InvalidCellRef(a1.to_string()));
        }

        Ok(Self {
            row: row - 1,
            col: col - 1,
        })
    }

    pub fn column_letters(&self) -> String {
        let mut n = self.col + 1;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        letters.iter().rev().collect()
    }
}

impl FromStr for CellRef {
    type Err = IndicatorBankError;

    fn from_str(s: &str) -> Result<Self> {
        CellRef::parse(s)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: HashMap<CellRef, RawCell>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&mut self, at: CellRef, value: RawCell) {
        if value.is_empty() {
            self.cells.remove(&at);
        } else {
            self.cells.insert(at, value);
        }
    }

    pub fn set_a1(&mut self, a1: &str, value: impl Into<RawCell>) -> Result<()> {
        let at = CellRef::parse(a1)?;
        self.set(at, value.into());
        Ok(())
    }

    pub fn get(&self, at: CellRef) -> &RawCell {
        self.cells.get(&at).unwrap_or(&EMPTY_CELL)
    }

    pub fn get_a1(&self, a1: &str) -> Result<&RawCell> {
        Ok(self.get(CellRef::parse(a1)?))
    }

    /// Dense grid from A1 to the last used cell. Empty sheets yield no rows.
    pub fn rows(&self) -> Vec<Vec<RawCell>> {
        let max_row = self.cells.keys().map(|c| c.row).max();
        let max_col = self.cells.keys().map(|c| c.col).max();

        match (max_row, max_col) {
            (Some(max_row), Some(max_col)) => (0..=max_row)
                .map(|row| {
                    (0..=max_col)
                        .map(|col| self.get(CellRef::new(row, col)).clone())
                        .collect()
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.add_sheet(sheet);
        self
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn first_sheet(&self) -> Result<&Sheet> {
        self.sheets.first().ok_or(IndicatorBankError::EmptyWorkbook)
    }

    /// Reads an `.xlsx`/`.xlsm` payload with calamine, keeping cached values only.
    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
        let mut workbook = Workbook::new();

        for name in reader.sheet_names() {
            let range = reader.worksheet_range(&name)?;
            let mut sheet = Sheet::new(name);

            if let Some((start_row, start_col)) = range.start() {
                for (row, col, data) in range.used_cells() {
                    sheet.set(
                        CellRef::new(start_row + row as u32, start_col + col as u32),
                        RawCell::from(data),
                    );
                }
            }

            workbook.add_sheet(sheet);
        }

        Ok(workbook)
    }
}
