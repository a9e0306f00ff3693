use crate::normalize::{format_number, format_percentage, round2};
use crate::workbook::RawCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A populated bank cell. Absent cells are `None` at the table level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn from_cell(cell: &RawCell) -> Option<Self> {
        match cell {
            RawCell::Empty => None,
            RawCell::Number(n) => Some(FieldValue::Number(*n)),
            RawCell::Text(s) => Some(FieldValue::Text(s.clone())),
            other => other.render().map(FieldValue::Text),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// True for text that is empty once trimmed.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Number(_) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

/// One indicator as extracted from a ficha.
///
/// A column mapped to `None` is an explicit blank and clears the bank cell on
/// upsert; a column missing from `fields` leaves the bank cell untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRecord {
    pub code: String,
    pub fields: BTreeMap<String, Option<FieldValue>>,
}

impl IndicatorRecord {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, column: impl Into<String>, value: Option<FieldValue>) {
        self.fields.insert(column.into(), value);
    }

    pub fn set_text(&mut self, column: impl Into<String>, value: Option<String>) {
        self.set(column, value.map(FieldValue::Text));
    }

    pub fn with(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.set(column, Some(value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column).and_then(|v| v.as_ref())
    }

    pub fn retain_columns(&mut self, columns: &[String]) {
        self.fields.retain(|k, _| columns.iter().any(|c| c == k));
    }
}

/// One month of a scorecard's measurement row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum MonthlyValue {
    Missing,
    Numeric(f64),
    /// Already scaled to 0..100
    Percentage(f64),
}

impl MonthlyValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MonthlyValue::Missing => None,
            MonthlyValue::Numeric(v) | MonthlyValue::Percentage(v) => Some(*v),
        }
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self, MonthlyValue::Percentage(_))
    }
}

pub const NOT_APPLICABLE: &str = "N/A";

/// The twelve months of one ficha, January first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries {
    values: Vec<MonthlyValue>,
}

impl MonthlySeries {
    pub fn new(values: Vec<MonthlyValue>) -> Self {
        Self { values }
    }

    /// Builds a series of plain numbers; `None` marks a missing month.
    pub fn from_options(values: &[Option<f64>]) -> Self {
        Self::new(
            values
                .iter()
                .map(|v| match v {
                    Some(n) => MonthlyValue::Numeric(*n),
                    None => MonthlyValue::Missing,
                })
                .collect(),
        )
    }

    pub fn values(&self) -> &[MonthlyValue] {
        &self.values
    }

    pub fn options(&self) -> Vec<Option<f64>> {
        self.values.iter().map(|v| v.value()).collect()
    }

    pub fn valid_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| v.value()).collect()
    }

    pub fn percentage_mode(&self) -> bool {
        self.values.iter().any(|v| v.is_percentage())
    }

    /// Bank cells for each month. Percentage formatting switches on at the
    /// first percentage month and stays on for the rest of the year.
    pub fn rendered(&self) -> Vec<FieldValue> {
        let mut percentage = false;
        self.values
            .iter()
            .map(|v| {
                percentage |= v.is_percentage();
                match v.value() {
                    None => FieldValue::text(NOT_APPLICABLE),
                    Some(n) if percentage => FieldValue::Text(format_percentage(n)),
                    Some(n) => FieldValue::Number(round2(n)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_from_cell() {
        assert_eq!(FieldValue::from_cell(&RawCell::Empty), None);
        assert_eq!(
            FieldValue::from_cell(&RawCell::Number(3.0)),
            Some(FieldValue::Number(3.0))
        );
        assert_eq!(
            FieldValue::from_cell(&RawCell::Error("#REF!".to_string())),
            Some(FieldValue::text("#REF!"))
        );
        assert_eq!(
            FieldValue::from_cell(&RawCell::DateTime(45000.0)),
            Some(FieldValue::text("2023-03-15 00:00:00"))
        );
    }

    #[test]
    fn test_record_explicit_blank_vs_absent() {
        let mut record = IndicatorRecord::new("IND-GES-1");
        record.set_text("OBSERVACIONES", None);
        assert!(record.fields.contains_key("OBSERVACIONES"));
        assert_eq!(record.get("OBSERVACIONES"), None);
        assert!(!record.fields.contains_key("TENDENCIA"));
    }

    #[test]
    fn test_rendering_switches_to_percentage() {
        let series = MonthlySeries::new(vec![
            MonthlyValue::Numeric(50.456),
            MonthlyValue::Missing,
            MonthlyValue::Percentage(85.0),
            MonthlyValue::Numeric(90.0),
        ]);
        let rendered = series.rendered();
        assert_eq!(rendered[0], FieldValue::Number(50.46));
        assert_eq!(rendered[1], FieldValue::text("N/A"));
        assert_eq!(rendered[2], FieldValue::text("85.00%"));
        assert_eq!(rendered[3], FieldValue::text("90.00%"));
        assert!(series.percentage_mode());
    }

    #[test]
    fn test_series_options() {
        let series = MonthlySeries::from_options(&[Some(1.0), None, Some(2.0)]);
        assert_eq!(series.valid_values(), vec![1.0, 2.0]);
        assert_eq!(series.options(), vec![Some(1.0), None, Some(2.0)]);
        assert!(!series.percentage_mode());
    }
}
