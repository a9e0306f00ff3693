use crate::normalize::{format_percentage, round2};
use crate::record::{FieldValue, MonthlySeries};
use crate::schema::Periodicity;
use serde::Serialize;

pub const NO_TYPE: &str = "NO TYPE";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AnnualAggregate {
    /// No valid month in the series
    Empty,
    /// Periodicity text did not name a known cadence
    NoType,
    Value { value: f64, percentage: bool },
}

impl AnnualAggregate {
    pub fn value(&self) -> Option<f64> {
        match self {
            AnnualAggregate::Value { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Bank cell for the annual value column.
    pub fn to_field_value(&self) -> FieldValue {
        match self {
            AnnualAggregate::Empty => FieldValue::text(""),
            AnnualAggregate::NoType => FieldValue::text(NO_TYPE),
            AnnualAggregate::Value {
                value,
                percentage: true,
            } => FieldValue::Text(format_percentage(*value)),
            AnnualAggregate::Value {
                value,
                percentage: false,
            } => FieldValue::Number(round2(*value)),
        }
    }
}

/// A series with fewer valid months than its periodicity expects is scored by
/// its worst month; otherwise months are averaged directly or as a mean of
/// per-period means, skipping periods with no data.
pub fn annual_aggregate(series: &MonthlySeries, periodicity: Option<&str>) -> AnnualAggregate {
    let valid = series.valid_values();
    if valid.is_empty() {
        return AnnualAggregate::Empty;
    }

    let Some(periodicity) = periodicity.and_then(Periodicity::parse) else {
        return AnnualAggregate::NoType;
    };

    AnnualAggregate::Value {
        value: aggregate_values(&series.options(), periodicity),
        percentage: series.percentage_mode(),
    }
}

/// Aggregates a month row (`None` = missing) that has at least one valid month.
pub fn aggregate_values(months: &[Option<f64>], periodicity: Periodicity) -> f64 {
    let valid: Vec<f64> = months.iter().flatten().copied().collect();

    if valid.len() < periodicity.minimum_valid_months() {
        return valid.iter().copied().fold(f64::INFINITY, f64::min);
    }

    match periodicity.group_size() {
        None => mean(&valid).unwrap_or(0.0),
        Some(size) => grouped_mean(months, size).unwrap_or(0.0),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn grouped_mean(months: &[Option<f64>], size: usize) -> Option<f64> {
    let group_means: Vec<f64> = months
        .chunks(size)
        .filter_map(|group| {
            let present: Vec<f64> = group.iter().flatten().copied().collect();
            mean(&present)
        })
        .collect();
    mean(&group_means)
}
