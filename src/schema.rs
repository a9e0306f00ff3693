use crate::normalize::month_labels;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const AREA: &str = "ÁREA";
pub const CODE: &str = "CONSE";
pub const NAME: &str = "INDICADOR";
pub const STATUS: &str = "ESTADO DEL INDICADOR";
pub const PROCESS: &str = "PROCESO";
pub const DESCRIPTION: &str = "OBJETIVO-DESCRIPCIÓN";
pub const ORIGIN: &str = "ORIGEN";
pub const FORMULA: &str = "FÓRMULA";
pub const NUMERATOR_SOURCE: &str = "FUENTE NUMERADOR";
pub const DENOMINATOR_SOURCE: &str = "FUENTE DENOMINADOR";
pub const HIERARCHY: &str = "JERARQUÍA";
pub const RELATED_STANDARD: &str = "NORMA RELACIONADA";
pub const INDICATOR_TYPE: &str = "TIPO DE INDICADOR";
pub const TREND: &str = "TENDENCIA";
pub const MEASUREMENT_PERIODICITY: &str = "PERIODICIDAD MEDICION";
pub const ANALYSIS_PERIODICITY: &str = "PERIODICIDAD ANÁLISIS";
pub const OBSERVATIONS: &str = "OBSERVACIONES";
pub const THRESHOLD_CRITICAL: &str = "Critico";
pub const THRESHOLD_ACCEPTABLE: &str = "Aceptable";
pub const THRESHOLD_SATISFACTORY: &str = "Satisfactorio";
pub const DOCUMENTED: &str = "DOCUMENTADO";
pub const CONTRACT_REVIEWED: &str = "DE SEG CONTRACTUAL";
pub const REVIEWED: &str = "REVISADOS";
pub const ANNUAL_VALUE: &str = "VALOR ANUAL";
pub const RATING: &str = "VALORACIÓN";

/// Master table columns in their persisted order, with month labels for `year`.
pub fn bank_columns(year: i32) -> Vec<String> {
    let leading = [
        AREA,
        CODE,
        NAME,
        STATUS,
        PROCESS,
        DESCRIPTION,
        ORIGIN,
        FORMULA,
        NUMERATOR_SOURCE,
        DENOMINATOR_SOURCE,
        HIERARCHY,
        RELATED_STANDARD,
        INDICATOR_TYPE,
        TREND,
        MEASUREMENT_PERIODICITY,
        ANALYSIS_PERIODICITY,
        OBSERVATIONS,
        THRESHOLD_CRITICAL,
        THRESHOLD_ACCEPTABLE,
        THRESHOLD_SATISFACTORY,
        DOCUMENTED,
        CONTRACT_REVIEWED,
        REVIEWED,
    ];

    let mut columns: Vec<String> = leading.iter().map(|c| c.to_string()).collect();
    columns.extend(month_labels(year));
    columns.push(ANNUAL_VALUE.to_string());
    columns.push(RATING.to_string());
    columns
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Periodicity {
    #[schemars(description = "Measured every month; the annual value is the mean of twelve months.")]
    Monthly,

    #[schemars(description = "Measured every two months; six consecutive month pairs.")]
    Bimonthly,

    #[schemars(description = "Measured every quarter; four consecutive month triples.")]
    Quarterly,

    #[schemars(description = "Measured every half-year; two consecutive six-month blocks.")]
    Semiannual,

    #[schemars(description = "Measured once a year; the annual value is the mean of what was reported.")]
    Annual,
}

impl Periodicity {
    pub const CANONICAL_ORDER: [Periodicity; 5] = [
        Periodicity::Monthly,
        Periodicity::Bimonthly,
        Periodicity::Quarterly,
        Periodicity::Semiannual,
        Periodicity::Annual,
    ];

    /// Accepts the Spanish labels used on the scorecards and their English names,
    /// ignoring case and surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "mensual" | "monthly" => Some(Periodicity::Monthly),
            "bimensual" | "bimonthly" => Some(Periodicity::Bimonthly),
            "trimestral" | "quarterly" => Some(Periodicity::Quarterly),
            "semestral" | "semiannual" => Some(Periodicity::Semiannual),
            "anual" | "annual" => Some(Periodicity::Annual),
            _ => None,
        }
    }

    /// Valid months needed before the regular averaging applies.
    pub fn minimum_valid_months(&self) -> usize {
        match self {
            Periodicity::Monthly => 12,
            Periodicity::Bimonthly => 6,
            Periodicity::Quarterly => 4,
            Periodicity::Semiannual => 2,
            Periodicity::Annual => 1,
        }
    }

    /// Months per averaging group, or `None` when all months are averaged together.
    pub fn group_size(&self) -> Option<usize> {
        match self {
            Periodicity::Monthly | Periodicity::Annual => None,
            Periodicity::Bimonthly => Some(2),
            Periodicity::Quarterly => Some(3),
            Periodicity::Semiannual => Some(6),
        }
    }

    /// Uppercase Spanish label as it appears in summary headers.
    pub fn label(&self) -> &'static str {
        match self {
            Periodicity::Monthly => "MENSUAL",
            Periodicity::Bimonthly => "BIMENSUAL",
            Periodicity::Quarterly => "TRIMESTRAL",
            Periodicity::Semiannual => "SEMESTRAL",
            Periodicity::Annual => "ANUAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_columns_layout() {
        let columns = bank_columns(2025);
        assert_eq!(columns.len(), 37);
        assert_eq!(columns[0], AREA);
        assert_eq!(columns[1], CODE);
        assert_eq!(columns[23], "ene-25");
        assert_eq!(columns[34], "dic-25");
        assert_eq!(columns[35], ANNUAL_VALUE);
        assert_eq!(columns[36], RATING);
    }

    #[test]
    fn test_periodicity_parse() {
        assert_eq!(Periodicity::parse("Mensual"), Some(Periodicity::Monthly));
        assert_eq!(Periodicity::parse(" TRIMESTRAL "), Some(Periodicity::Quarterly));
        assert_eq!(Periodicity::parse("Semiannual"), Some(Periodicity::Semiannual));
        assert_eq!(Periodicity::parse("Cuatrimestral"), None);
        assert_eq!(Periodicity::parse(""), None);
    }

    #[test]
    fn test_periodicity_rules() {
        let minimums: Vec<usize> = Periodicity::CANONICAL_ORDER
            .iter()
            .map(|p| p.minimum_valid_months())
            .collect();
        assert_eq!(minimums, vec![12, 6, 4, 2, 1]);
        assert_eq!(Periodicity::Quarterly.group_size(), Some(3));
        assert_eq!(Periodicity::Annual.group_size(), None);
    }
}
