use crate::config::ManualOverrideLayout;
use crate::error::{IndicatorBankError, Result};
use crate::normalize::normalize_code;
use crate::record::FieldValue;
use crate::registry::MasterTable;
use crate::workbook::Workbook;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ManualOverrides {
    columns: Vec<String>,
    /// code -> one value per override column
    values: HashMap<String, Vec<Option<FieldValue>>>,
}

impl ManualOverrides {
    /// Reads the first sheet of the override workbook. Its header row must
    /// contain the code column and every override column.
    pub fn from_workbook(workbook: &Workbook, layout: &ManualOverrideLayout) -> Result<Self> {
        let mut grid = workbook.first_sheet()?.rows().into_iter();
        let header: Vec<String> = grid
            .next()
            .unwrap_or_default()
            .iter()
            .map(|cell| cell.render().map(|h| h.trim().to_string()).unwrap_or_default())
            .collect();

        let position = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| IndicatorBankError::MissingColumn(name.to_string()))
        };

        let code_col = position(&layout.code_column)?;
        let value_cols = layout
            .columns
            .iter()
            .map(|c| position(c))
            .collect::<Result<Vec<_>>>()?;

        let mut values = HashMap::new();
        for row in grid {
            let Some(code) = row
                .get(code_col)
                .and_then(|c| c.render())
                .and_then(|c| normalize_code(&c))
            else {
                continue;
            };
            if values.contains_key(&code) {
                warn!("Duplicate code {} in manual overrides, keeping the first", code);
                continue;
            }
            let cells = value_cols
                .iter()
                .map(|&c| row.get(c).and_then(FieldValue::from_cell))
                .collect();
            values.insert(code, cells);
        }

        debug!("Loaded manual overrides for {} codes", values.len());
        Ok(Self {
            columns: layout.columns.clone(),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, code: &str, column: &str) -> Option<&FieldValue> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.values.get(code)?.get(col)?.as_ref()
    }

    /// Writes non-empty override values into matching bank rows. Returns the
    /// number of cells changed.
    pub fn apply(&self, table: &mut MasterTable) -> Result<usize> {
        let targets = self
            .columns
            .iter()
            .map(|c| table.require_column(c))
            .collect::<Result<Vec<_>>>()?;

        let mut changed = 0;
        for row in 0..table.len() {
            let Some(cells) = table.code_at(row).and_then(|code| self.values.get(code)) else {
                continue;
            };
            for (value, &col) in cells.iter().zip(&targets) {
                if let Some(value) = value.as_ref().filter(|v| !v.is_blank()) {
                    table.set_cell(row, col, Some(value.clone()));
                    changed += 1;
                }
            }
        }

        info!("Manual overrides changed {} cells", changed);
        Ok(changed)
    }
}

/// Clears text cells holding spreadsheet formulas so they are never written
/// back as live formulas.
pub fn scrub_formula_cells(table: &mut MasterTable) -> usize {
    let mut cleared = 0;
    for row in table.rows_mut() {
        for cell in row.iter_mut() {
            if matches!(cell, Some(FieldValue::Text(s)) if s.starts_with('=')) {
                *cell = None;
                cleared += 1;
            }
        }
    }
    if cleared > 0 {
        debug!("Cleared {} formula cells", cleared);
    }
    cleared
}
