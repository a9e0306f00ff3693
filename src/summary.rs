//! Cross-tabulations of the final bank.
//!
//! Every table counts indicator codes per label, carries a `TOTAL` column
//! with the row sum of its count columns and ends with a `GRAND TOTAL` row.
//! Rows whose index or column value is blank are left out.

use crate::error::Result;
use crate::registry::MasterTable;
use crate::schema::{
    Periodicity, AREA, CODE, HIERARCHY, INDICATOR_TYPE, MEASUREMENT_PERIODICITY, STATUS,
};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const TOTAL: &str = "TOTAL";
pub const GRAND_TOTAL: &str = "GRAND TOTAL";
pub const CODES_SUFFIX: &str = " - CODES";
pub const COUNT: &str = "COUNT";
pub const TOTAL_INDICATORS: &str = "Total Indicators";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PivotCell {
    Count(u64),
    Codes(String),
    Blank,
}

impl PivotCell {
    pub fn count(&self) -> Option<u64> {
        match self {
            PivotCell::Count(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub label: String,
    pub cells: Vec<PivotCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub index_header: String,
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    pub fn get(&self, row: &str, column: &str) -> Option<&PivotCell> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.iter().find(|r| r.label == row)?.cells.get(col)
    }

    pub fn count(&self, row: &str, column: &str) -> Option<u64> {
        self.get(row, column).and_then(PivotCell::count)
    }

    pub fn grand_total(&self) -> Option<u64> {
        self.count(GRAND_TOTAL, TOTAL)
    }

    /// Row labels without the grand total row.
    pub fn labels(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.label.as_str())
            .filter(|l| *l != GRAND_TOTAL)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankSummaries {
    pub by_area: PivotTable,
    pub by_status: PivotTable,
    pub by_periodicity: PivotTable,
    pub general: PivotTable,
    pub by_hierarchy: PivotTable,
    pub by_type: PivotTable,
}

impl BankSummaries {
    /// Sheet name and table, in workbook order.
    pub fn sheets(&self) -> [(&'static str, &PivotTable); 6] {
        [
            ("Resumen_Area", &self.by_area),
            ("Resumen_Estado", &self.by_status),
            ("Resumen_Periodicidad", &self.by_periodicity),
            ("Resumen_General", &self.general),
            ("Resumen_Jerarquia", &self.by_hierarchy),
            ("Resumen_Tipo", &self.by_type),
        ]
    }
}

pub fn generate_summaries(table: &MasterTable) -> Result<BankSummaries> {
    table.require_column(CODE)?;

    let summaries = BankSummaries {
        by_area: single_count(table, AREA)?,
        by_status: single_count(table, STATUS)?,
        by_periodicity: periodicity_by_area(table)?,
        general: general(table),
        by_hierarchy: cross_count(table, AREA, HIERARCHY)?,
        by_type: cross_count(table, INDICATOR_TYPE, AREA)?,
    };
    debug!("Generated summaries for {} indicators", table.len());
    Ok(summaries)
}

/// index label -> column label -> codes
type Grid = BTreeMap<String, BTreeMap<String, Vec<String>>>;

fn cell_label(table: &MasterTable, row: usize, col: usize) -> Option<String> {
    table.rows()[row][col]
        .as_ref()
        .map(|v| v.as_text().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collect_grid(
    table: &MasterTable,
    index: &str,
    column: Option<&str>,
    normalize: fn(String) -> String,
) -> Result<Grid> {
    let index_col = table.require_column(index)?;
    let column_col = column.map(|c| table.require_column(c)).transpose()?;

    let mut grid = Grid::new();
    for row in 0..table.len() {
        let Some(code) = table.code_at(row) else {
            continue;
        };
        let Some(label) = cell_label(table, row, index_col) else {
            continue;
        };
        let column_label = match column_col {
            Some(c) => match cell_label(table, row, c) {
                Some(l) => normalize(l),
                None => continue,
            },
            None => COUNT.to_string(),
        };
        grid.entry(label)
            .or_default()
            .entry(column_label)
            .or_default()
            .push(code.to_string());
    }
    Ok(grid)
}

#[derive(Clone, Copy, PartialEq)]
enum ColumnKind {
    Count,
    Codes,
}

struct ColumnSpec {
    header: String,
    source: String,
    kind: ColumnKind,
}

fn build(index_header: &str, grid: &Grid, specs: &[ColumnSpec]) -> PivotTable {
    let mut rows: Vec<PivotRow> = grid
        .iter()
        .map(|(label, by_column)| {
            let mut cells: Vec<PivotCell> = specs
                .iter()
                .map(|spec| {
                    let codes = by_column.get(&spec.source);
                    match spec.kind {
                        ColumnKind::Count => {
                            PivotCell::Count(codes.map(|c| c.len() as u64).unwrap_or(0))
                        }
                        ColumnKind::Codes => {
                            let distinct: BTreeSet<&str> = codes
                                .into_iter()
                                .flatten()
                                .map(|c| c.as_str())
                                .collect();
                            PivotCell::Codes(distinct.into_iter().collect::<Vec<_>>().join(", "))
                        }
                    }
                })
                .collect();
            let total = cells.iter().filter_map(PivotCell::count).sum();
            cells.push(PivotCell::Count(total));
            PivotRow {
                label: label.clone(),
                cells,
            }
        })
        .collect();

    let mut totals: Vec<PivotCell> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| match spec.kind {
            ColumnKind::Count => PivotCell::Count(
                rows.iter().filter_map(|r| r.cells[i].count()).sum(),
            ),
            ColumnKind::Codes => PivotCell::Blank,
        })
        .collect();
    totals.push(PivotCell::Count(
        rows.iter().filter_map(|r| r.cells.last().and_then(PivotCell::count)).sum(),
    ));
    rows.push(PivotRow {
        label: GRAND_TOTAL.to_string(),
        cells: totals,
    });

    let mut columns: Vec<String> = specs.iter().map(|s| s.header.clone()).collect();
    columns.push(TOTAL.to_string());

    PivotTable {
        index_header: index_header.to_string(),
        columns,
        rows,
    }
}

fn count_spec(label: &str) -> ColumnSpec {
    ColumnSpec {
        header: label.to_string(),
        source: label.to_string(),
        kind: ColumnKind::Count,
    }
}

fn codes_spec(label: &str) -> ColumnSpec {
    ColumnSpec {
        header: format!("{}{}", label, CODES_SUFFIX),
        source: label.to_string(),
        kind: ColumnKind::Codes,
    }
}

fn column_labels(grid: &Grid) -> BTreeSet<String> {
    grid.values().flat_map(|m| m.keys().cloned()).collect()
}

fn single_count(table: &MasterTable, index: &str) -> Result<PivotTable> {
    let grid = collect_grid(table, index, None, |s| s)?;
    Ok(build(index, &grid, &[count_spec(COUNT)]))
}

fn cross_count(table: &MasterTable, index: &str, column: &str) -> Result<PivotTable> {
    let grid = collect_grid(table, index, Some(column), |s| s)?;
    let specs: Vec<ColumnSpec> = column_labels(&grid).iter().map(|l| count_spec(l)).collect();
    Ok(build(index, &grid, &specs))
}

fn periodicity_by_area(table: &MasterTable) -> Result<PivotTable> {
    let grid = collect_grid(table, AREA, Some(MEASUREMENT_PERIODICITY), |s| {
        match Periodicity::parse(&s) {
            Some(p) => p.label().to_string(),
            None => s.to_uppercase(),
        }
    })?;
    let labels = column_labels(&grid);

    let mut specs = Vec::new();
    for periodicity in Periodicity::CANONICAL_ORDER {
        if labels.contains(periodicity.label()) {
            specs.push(count_spec(periodicity.label()));
            specs.push(codes_spec(periodicity.label()));
        }
    }

    let others: Vec<&String> = labels
        .iter()
        .filter(|l| {
            !Periodicity::CANONICAL_ORDER
                .iter()
                .any(|p| p.label() == l.as_str())
        })
        .collect();
    specs.extend(others.iter().map(|l| count_spec(l)));
    specs.extend(others.iter().map(|l| codes_spec(l)));

    Ok(build(AREA, &grid, &specs))
}

fn general(table: &MasterTable) -> PivotTable {
    PivotTable {
        index_header: "Indicator".to_string(),
        columns: vec![TOTAL.to_string()],
        rows: vec![PivotRow {
            label: TOTAL_INDICATORS.to_string(),
            cells: vec![PivotCell::Count(table.len() as u64)],
        }],
    }
}
