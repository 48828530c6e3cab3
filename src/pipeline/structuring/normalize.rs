use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{json, Map, Number, Value};

use super::types::NumericCoercionWarning;
use crate::pipeline::record::{as_number, is_present, lookup, parse_amount, PayslipRecord};

/// Keys whose string values are coerced to numbers.
pub const FINANCIAL_KEYS: &[&str] = &[
    "beløb",
    "amount",
    "sats",
    "procent",
    "arbejdsmarkedsbidrag",
    "skat",
    "fradrag",
    "fast_løn_i_alt",
    "samlet_løn_før_skat",
    "netto_udbetalt",
    "trækprocent",
    "samlet_pensionsbidrag",
    "eget_bidrag",
    "pensionsprocent",
    "optjent",
    "udbetalt",
    "heraf_pension",
];

/// Labor-market contribution rate assumed when it cannot be derived.
const DEFAULT_AM_PERCENT: f64 = 8.0;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap());
static DANISH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})\.(\d{2})\.(\d{4}|\d{2})").unwrap());
static ANY_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[./-](\d{1,2})[./-](\d{2,4})").unwrap());
static SHIFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2})[:.](\d{2})\s*-\s*(\d{1,2})[:.](\d{2})").unwrap()
});

/// What normalization changed or could not change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub coercion_warnings: Vec<NumericCoercionWarning>,
    /// Summary sections created or completed from alternate paths.
    pub filled_fields: Vec<&'static str>,
    pub derived_calendar_entries: usize,
}

/// Complete the summary sections, coerce financial strings and derive
/// calendar entries. Running it twice yields the same record.
///
/// Summary fields are filled before coercion so that strings copied from
/// non-financial keys (`feriegodtgørelse_fond`) are coerced in the same pass.
pub fn normalize_record(record: &mut PayslipRecord) -> NormalizationReport {
    let filled_fields = ensure_required_fields(record);

    let coercion_warnings = coerce_financial_values(record.as_value_mut());
    for warning in &coercion_warnings {
        tracing::warn!(path = %warning.path, value = %warning.value, "Numeric coercion failed");
    }

    let derived_calendar_entries = ensure_calendar_entries(record);

    tracing::debug!(
        coercion_failures = coercion_warnings.len(),
        filled = ?filled_fields,
        calendar_entries = derived_calendar_entries,
        "Record normalized"
    );

    NormalizationReport {
        coercion_warnings,
        filled_fields,
        derived_calendar_entries,
    }
}

// ──────────────────────────────────────────────
// Numeric coercion
// ──────────────────────────────────────────────

/// Convert string values under `FINANCIAL_KEYS` into numbers, anywhere in
/// the tree. Failures leave the value as is and are reported.
pub fn coerce_financial_values(value: &mut Value) -> Vec<NumericCoercionWarning> {
    let mut warnings = Vec::new();
    coerce_at(value, String::new(), &mut warnings);
    warnings
}

fn coerce_at(value: &mut Value, path: String, warnings: &mut Vec<NumericCoercionWarning>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                if let Value::String(s) = child {
                    if FINANCIAL_KEYS.contains(&key.as_str()) {
                        match parse_amount(s).and_then(Number::from_f64) {
                            Some(n) => *child = Value::Number(n),
                            None => warnings.push(NumericCoercionWarning {
                                path: child_path,
                                value: s.clone(),
                            }),
                        }
                    }
                } else {
                    coerce_at(child, child_path, warnings);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                coerce_at(item, format!("{path}[{i}]"), warnings);
            }
        }
        _ => {}
    }
}

// ──────────────────────────────────────────────
// Required summary sections
// ──────────────────────────────────────────────

/// Create or complete `feriepenge`, `bruttolon`, `a_skat` and `am_bidrag`
/// from the detailed sections. Only absent or null leaves are written.
pub fn ensure_required_fields(record: &mut PayslipRecord) -> Vec<&'static str> {
    let root_value = record.as_value();
    if !root_value.is_object() {
        return Vec::new();
    }

    let vacation = found(root_value, &[&["ferie", "feriegodtgørelse_fond"], &["ferie", "ferietillæg_maj"]]);
    let gross = found(root_value, &[&["løn", "samlet_løn_før_skat"]]);
    let pension = found(root_value, &[&["pension", "samlet_pensionsbidrag"]]);
    let tax = found(root_value, &[&["løn", "skat", "skat"]]);
    let tax_percent = found(root_value, &[&["løn", "skat", "trækprocent"]]);
    let am = found(root_value, &[&["løn", "skat", "arbejdsmarkedsbidrag"]]);
    let am_percent = labor_market_percent(am.as_ref(), gross.as_ref());

    let sections: [(&'static str, Vec<(&str, Option<Value>)>); 4] = [
        ("feriepenge", vec![("optjent", vacation), ("udbetalt", None)]),
        ("bruttolon", vec![("beløb", gross), ("heraf_pension", pension)]),
        ("a_skat", vec![("beløb", tax), ("procent", tax_percent)]),
        ("am_bidrag", vec![("beløb", am), ("procent", Some(json!(am_percent)))]),
    ];

    let Some(root) = record.as_value_mut().as_object_mut() else {
        return Vec::new();
    };
    let mut filled = Vec::new();
    for (key, fields) in sections {
        if fill_section(root, key, fields) {
            filled.push(key);
        }
    }
    filled
}

fn found(root: &Value, paths: &[&[&str]]) -> Option<Value> {
    paths
        .iter()
        .filter_map(|p| lookup(root, p))
        .find(|v| is_present(v))
        .cloned()
}

/// `round(amount / gross × 100, 1)` when both are known and non-zero.
fn labor_market_percent(amount: Option<&Value>, gross: Option<&Value>) -> f64 {
    match (amount.and_then(as_number), gross.and_then(as_number)) {
        (Some(am), Some(gross)) if am != 0.0 && gross != 0.0 => (am / gross * 1000.0).round() / 10.0,
        _ => DEFAULT_AM_PERCENT,
    }
}

fn fill_section(root: &mut Map<String, Value>, key: &str, fields: Vec<(&str, Option<Value>)>) -> bool {
    match root.get_mut(key) {
        None | Some(Value::Null) => {
            let section: Map<String, Value> = fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.unwrap_or(Value::Null)))
                .collect();
            root.insert(key.to_string(), Value::Object(section));
            true
        }
        Some(Value::Object(section)) => {
            let mut changed = false;
            for (name, value) in fields {
                let Some(value) = value else { continue };
                if matches!(section.get(name), None | Some(Value::Null)) {
                    section.insert(name.to_string(), value);
                    changed = true;
                }
            }
            changed
        }
        // A bare number or string is kept as the model wrote it.
        Some(_) => false,
    }
}

// ──────────────────────────────────────────────
// Calendar entries
// ──────────────────────────────────────────────

/// Fill `arbejdstimer_ics` from `arbejdstimer` when it is missing or empty.
/// Returns the number of entries written.
pub fn ensure_calendar_entries(record: &mut PayslipRecord) -> usize {
    let work_days = record.list("arbejdstimer");
    if work_days.is_empty() || !record.list("arbejdstimer_ics").is_empty() {
        return 0;
    }
    let entries = derive_calendar_entries(work_days);
    let count = entries.len();

    if let Some(root) = record.as_value_mut().as_object_mut() {
        root.insert("arbejdstimer_ics".to_string(), Value::Array(entries));
    }
    count
}

/// One `{start, end, summary, description}` entry per parseable work day.
pub fn derive_calendar_entries(work_days: &[Value]) -> Vec<Value> {
    let entries: Vec<Value> = work_days.iter().filter_map(calendar_entry).collect();
    if entries.len() < work_days.len() {
        tracing::debug!(
            skipped = work_days.len() - entries.len(),
            "Work days without usable date or shift skipped"
        );
    }
    entries
}

fn calendar_entry(day: &Value) -> Option<Value> {
    let date = parse_work_date(day.get("dato")?.as_str()?)?;
    let (start, end) = parse_shift(date, day.get("arbejdstid")?.as_str()?)?;

    let mut description = Vec::new();
    if let Some(norm) = day.get("normtid").filter(|v| is_present(v)) {
        description.push(format!("Normtid: {}", display_value(norm)));
    }
    match day.get("tillæg") {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(s) => description.push(s.clone()),
                    Value::Object(o) => {
                        if let Some(kind) = o.get("type").filter(|v| is_present(v)) {
                            description.push(display_value(kind));
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(Value::String(s)) if !s.trim().is_empty() => description.push(s.clone()),
        _ => {}
    }
    if let Some(absence) = day.get("fravær").filter(|v| is_present(v)) {
        description.push(format!("Fravær: {}", display_value(absence)));
    }

    Some(json!({
        "start": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "end": end.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "summary": "Arbejde",
        "description": description.join(" | "),
    }))
}

/// ISO, `dd.mm.yyyy`, `dd.mm.yy` or any `d/m/y` pattern in the string.
pub fn parse_work_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let (day, month, year) = if let Some(c) = ISO_DATE.captures(raw) {
        (c[3].to_string(), c[2].to_string(), c[1].to_string())
    } else if let Some(c) = DANISH_DATE.captures(raw).or_else(|| ANY_DATE.captures(raw)) {
        (c[1].to_string(), c[2].to_string(), c[3].to_string())
    } else {
        return None;
    };

    let year: i32 = year.parse().ok()?;
    let year = if year < 100 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// `hh:mm-hh:mm` (dots tolerated). A shift ending before its start hour
/// ends the next day.
pub fn parse_shift(date: NaiveDate, raw: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let c = SHIFT.captures(raw)?;
    let [start_h, start_m, end_h, end_m]: [u32; 4] = [
        c[1].parse().ok()?,
        c[2].parse().ok()?,
        c[3].parse().ok()?,
        c[4].parse().ok()?,
    ];

    let start = date.and_hms_opt(start_h, start_m, 0)?;
    let end_date = if end_h < start_h { date.succ_opt()? } else { date };
    let end = if end_h == 24 && end_m == 0 {
        end_date.and_hms_opt(0, 0, 0)? + Duration::days(1)
    } else {
        end_date.and_hms_opt(end_h, end_m, 0)?
    };
    Some((start, end))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
