use crate::workbook::RawCell;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

pub const WORKBOOK_EXTENSIONS: [&str; 2] = [".xlsx", ".xlsm"];

/// Trims a string; blank input becomes `None`.
pub fn clean_str(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn clean_text(cell: &RawCell) -> Option<String> {
    cell.render().and_then(|s| clean_str(&s))
}

/// Canonical indicator code: trimmed, uppercased, without inner spaces.
pub fn normalize_code(value: &str) -> Option<String> {
    let code: String = value
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| *c != ' ')
        .collect();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Trailing decimal suffix of a code (`IND-GES-12` -> 12). Codes without one sort as 0.
pub fn code_suffix_number(code: &str) -> u64 {
    let digits: String = code
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().unwrap_or(0)
}

/// Integral values drop the decimal point, everything else keeps its shortest form.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Two-decimal rounding with exact ties going to the even digit, the same
/// rounding `format_percentage` renders.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.2}", value).parse().unwrap_or(value)
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}

pub fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Bank column label for a month, e.g. `ene-25` or `sept-25`.
pub fn month_label(year: i32, month: u32) -> String {
    let idx = (month.clamp(1, 12) - 1) as usize;
    format!("{}-{:02}", MONTH_ABBREVIATIONS[idx], year.rem_euclid(100))
}

pub fn month_labels(year: i32) -> Vec<String> {
    (1..=12).map(|m| month_label(year, m)).collect()
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES[(month.clamp(1, 12) - 1) as usize]
}

pub fn has_workbook_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    WORKBOOK_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Lowercase file name without its workbook extension.
pub fn file_stem_lower(name: &str) -> String {
    let mut stem = name.to_lowercase();
    for ext in WORKBOOK_EXTENSIONS {
        stem = stem.replace(ext, "");
    }
    stem
}
