//! The loosely-typed payslip tree returned by extraction.
//!
//! Extraction output is inconsistent: the same figure may appear at several
//! paths (`bruttolon.beløb`, `løn.samlet_løn_før_skat`, ...), as a number, a
//! numeric string or an `{ "beløb": .. }` object. Lookups here take ordered
//! lists of alternate paths and return the first usable value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A path of object keys from the record root.
pub type FieldPath = &'static [&'static str];

/// Keys probed, in order, when a number is stored as an object.
pub const AMOUNT_KEYS: &[&str] = &["amount", "beløb", "value", "samlet"];

/// Alternate locations of the summary figures.
pub mod paths {
    use super::FieldPath;

    pub const GROSS_PAY: &[FieldPath] = &[
        &["bruttolon"],
        &["løn", "samlet_løn_før_skat"],
        &["indkomstoplysninger", "bruttolon"],
    ];

    pub const INCOME_TAX: &[FieldPath] = &[
        &["a_skat"],
        &["løn", "skat", "skat"],
        &["fradrag", "a_skat"],
        &["fradrag", "A-skat"],
    ];

    pub const TAX_PERCENT: &[FieldPath] = &[&["a_skat", "procent"], &["løn", "skat", "trækprocent"]];

    pub const LABOR_MARKET: &[FieldPath] = &[
        &["am_bidrag"],
        &["løn", "skat", "arbejdsmarkedsbidrag"],
        &["fradrag", "am_bidrag"],
        &["fradrag", "AM-bidrag"],
    ];

    pub const VACATION_PAY: &[FieldPath] = &[
        &["feriepenge", "optjent"],
        &["feriepenge"],
        &["ferie", "feriegodtgørelse_fond"],
        &["ferie", "ferietillæg_maj"],
    ];

    pub const PENSION_TOTAL: &[FieldPath] =
        &[&["bruttolon", "heraf_pension"], &["pension", "samlet_pensionsbidrag"]];

    pub const PERIOD: &[FieldPath] = &[&["metadata", "periode"], &["periode"]];
    pub const EMPLOYEE_NAME: &[FieldPath] = &[&["metadata", "navn"], &["navn"]];
    pub const WORKPLACE: &[FieldPath] = &[&["metadata", "arbejdsplads"]];
    pub const NET_PAY: &[FieldPath] = &[&["løn", "netto_udbetalt"], &["netto_udbetalt"]];
}

/// Normalized extraction result. Serializes as the bare JSON tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayslipRecord(Value);

impl PayslipRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Root mapping, or `None` when the model returned something else.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.0, path)
    }

    /// First non-empty value among the alternate paths.
    pub fn first_present(&self, paths: &[FieldPath]) -> Option<&Value> {
        paths
            .iter()
            .filter_map(|p| self.get_path(p))
            .find(|v| is_present(v))
    }

    /// First value among the alternate paths that reads as a number.
    pub fn first_number(&self, paths: &[FieldPath]) -> Option<f64> {
        paths
            .iter()
            .filter_map(|p| self.get_path(p))
            .find_map(as_number)
    }

    /// Entries of a list field, empty when absent or not a list.
    pub fn list(&self, key: &str) -> &[Value] {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Null, empty strings, empty lists and empty objects count as absent.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Read a number from a JSON number, a numeric string, or an object holding
/// one of the `AMOUNT_KEYS`.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        Value::Object(map) => AMOUNT_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_amount(s),
                _ => None,
            }),
        _ => None,
    }
}

/// Parse an amount as written on Danish payslips or by a model.
///
/// Handles `24.559,41`, `24559.41`, `1 381,06`, `31.805.89`, `8,0 %` and
/// `kr. 600`. With both separators present the later one is the decimal
/// point. A lone dot followed by exactly three digits is a thousands
/// separator. Several dots keep only the last as decimal point unless it
/// closes a group of three.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let lower = raw.trim().to_lowercase();
    let mut s = lower.as_str();
    for affix in ["dkk", "kr.", "kr", "%"] {
        s = s.trim_start_matches(affix).trim_end_matches(affix).trim();
    }
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let last_dot = compact.rfind('.');
    let last_comma = compact.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (None, Some(_)) if compact.matches(',').count() == 1 => compact.replace(',', "."),
        (None, Some(_)) => compact.replace(',', ""),
        (Some(dot), None) => {
            let fraction_len = compact.len() - dot - 1;
            let dots = compact.matches('.').count();
            if fraction_len == 3 {
                compact.replace('.', "")
            } else if dots > 1 {
                let (whole, fraction) = compact.split_at(dot);
                format!("{}{}", whole.replace('.', ""), fraction)
            } else {
                compact
            }
        }
        (None, None) => compact,
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amounts_in_danish_and_model_notation() {
        assert_eq!(parse_amount("24.559,41"), Some(24559.41));
        assert_eq!(parse_amount("24559.41"), Some(24559.41));
        assert_eq!(parse_amount("1 381,06"), Some(1381.06));
        assert_eq!(parse_amount("-161,18"), Some(-161.18));
        assert_eq!(parse_amount("31.805.89"), Some(31805.89));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
        assert_eq!(parse_amount("1.751"), Some(1751.0));
        assert_eq!(parse_amount("1,234,567.5"), Some(1234567.5));
        assert_eq!(parse_amount("41"), Some(41.0));
    }

    #[test]
    fn amounts_with_units() {
        assert_eq!(parse_amount("8,0 %"), Some(8.0));
        assert_eq!(parse_amount("kr. 600,00"), Some(600.0));
        assert_eq!(parse_amount("2.796,00 DKK"), Some(2796.0));
    }

    #[test]
    fn non_numeric_strings_fail() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("ukendt"), None);
        assert_eq!(parse_amount("kr"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn as_number_reads_amount_objects() {
        assert_eq!(as_number(&json!({"beløb": 11261.0, "procent": 41})), Some(11261.0));
        assert_eq!(as_number(&json!({"samlet": "9.260,85"})), Some(9260.85));
        assert_eq!(as_number(&json!({"optjent": 1381.06})), None);
        assert_eq!(as_number(&json!(null)), None);
        assert_eq!(as_number(&json!([1, 2])), None);
    }

    #[test]
    fn first_number_skips_empty_alternates() {
        let record = PayslipRecord::new(json!({
            "bruttolon": {"beløb": null, "heraf_pension": null},
            "løn": {"samlet_løn_før_skat": 34957.0}
        }));
        assert_eq!(record.first_number(paths::GROSS_PAY), Some(34957.0));
    }

    #[test]
    fn first_present_ignores_blank_values() {
        let record = PayslipRecord::new(json!({
            "metadata": {"periode": "  "},
            "periode": "august 2024"
        }));
        assert_eq!(record.first_present(paths::PERIOD), Some(&json!("august 2024")));
        assert_eq!(record.first_present(paths::EMPLOYEE_NAME), None);
    }

    #[test]
    fn list_defaults_to_empty() {
        let record = PayslipRecord::new(json!({"arbejdstimer": "ingen"}));
        assert!(record.list("arbejdstimer").is_empty());
        assert!(record.list("mangler").is_empty());
    }

    #[test]
    fn serializes_transparently() {
        let record = PayslipRecord::new(json!({"a": 1}));
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"a":1}"#);
    }
}
