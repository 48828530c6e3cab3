// Statutory plausibility checks on a normalized payslip record.
// Issues are data: validation never fails, it reports.

use serde::{Deserialize, Serialize};

use crate::pipeline::record::{paths, PayslipRecord};
use crate::pipeline_config::ValidationRules;

/// Sections that count as the income section.
const INCOME_SECTIONS: &[&str] = &["løn", "indkomstoplysninger"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    InvalidFormat,
    MissingSection,
    MissingField,
    NegativeValue,
    BelowThreshold,
    UnusualValue,
    IncorrectValue,
    MissingWorkHours,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the checked field. Serialized as `field`.
    #[serde(rename = "field")]
    pub field_path: String,
    pub issue_type: IssueType,
    pub description: String,
    pub severity: Severity,
}

impl ValidationIssue {
    fn new(field_path: &str, issue_type: IssueType, severity: Severity, description: String) -> Self {
        Self {
            field_path: field_path.to_string(),
            issue_type,
            description,
            severity,
        }
    }
}

/// `valid` is false exactly when some issue has error severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let valid = !issues.iter().any(|i| i.severity == Severity::Error);
        Self { valid, issues }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}

/// Run every check against `record`.
pub fn validate(record: &PayslipRecord, rules: &ValidationRules) -> ValidationOutcome {
    let Some(root) = record.as_object() else {
        tracing::error!("Payslip record is not a mapping");
        return ValidationOutcome::from_issues(vec![ValidationIssue::new(
            "payslip_data",
            IssueType::InvalidFormat,
            Severity::Error,
            "Lønseddeldata har ikke det forventede objektformat.".into(),
        )]);
    };

    let mut issues = Vec::new();

    // Structure
    if !root.contains_key("metadata") {
        issues.push(ValidationIssue::new(
            "metadata",
            IssueType::MissingSection,
            Severity::Error,
            "Sektionen 'metadata' mangler.".into(),
        ));
    }
    if !INCOME_SECTIONS.iter().any(|s| root.contains_key(*s)) {
        issues.push(ValidationIssue::new(
            "løn",
            IssueType::MissingSection,
            Severity::Error,
            "Lønsektionen ('løn' eller 'indkomstoplysninger') mangler.".into(),
        ));
    }

    check_metadata(record, &mut issues);

    let gross = record.first_number(paths::GROSS_PAY).unwrap_or(0.0);
    if gross < 0.0 {
        issues.push(ValidationIssue::new(
            "bruttolon",
            IssueType::NegativeValue,
            Severity::Error,
            format!("Bruttoløn ({gross:.2}) er negativ."),
        ));
    }

    if gross > 0.0 {
        check_vacation_pay(record, gross, rules, &mut issues);
        check_income_tax(record, gross, rules, &mut issues);
        check_labor_market(record, gross, rules, &mut issues);
    }

    if record.list("arbejdstimer").is_empty() {
        issues.push(ValidationIssue::new(
            "arbejdstimer",
            IssueType::MissingWorkHours,
            Severity::Warning,
            "Ingen arbejdstimer fundet; kalenderafstemning er ikke mulig.".into(),
        ));
    }

    let outcome = ValidationOutcome::from_issues(issues);
    tracing::info!(
        valid = outcome.valid,
        issues = outcome.issues.len(),
        gross,
        "Payslip validated"
    );
    outcome
}

fn check_metadata(record: &PayslipRecord, issues: &mut Vec<ValidationIssue>) {
    for (field, field_paths, label) in [
        ("metadata.periode", paths::PERIOD, "Lønperiode"),
        ("metadata.navn", paths::EMPLOYEE_NAME, "Medarbejderens navn"),
    ] {
        if record.first_present(field_paths).is_none() {
            issues.push(ValidationIssue::new(
                field,
                IssueType::MissingField,
                Severity::Warning,
                format!("{label} mangler."),
            ));
        }
    }
}

fn check_vacation_pay(
    record: &PayslipRecord,
    gross: f64,
    rules: &ValidationRules,
    issues: &mut Vec<ValidationIssue>,
) {
    let vacation = record.first_number(paths::VACATION_PAY).unwrap_or(0.0);
    let expected = gross * rules.vacation_pay_rate;
    if vacation < expected - rules.rounding_tolerance {
        issues.push(ValidationIssue::new(
            "feriepenge",
            IssueType::BelowThreshold,
            Severity::Warning,
            format!(
                "Feriepenge ({vacation:.2}) ser ud til at være under {:.1}% af bruttoløn ({expected:.2}) eller mangler.",
                rules.vacation_pay_rate * 100.0
            ),
        ));
    }
}

fn check_income_tax(
    record: &PayslipRecord,
    gross: f64,
    rules: &ValidationRules,
    issues: &mut Vec<ValidationIssue>,
) {
    let tax = record.first_number(paths::INCOME_TAX).unwrap_or(0.0);
    let min = gross * rules.min_tax_rate;
    let max = gross * rules.max_tax_rate;
    if tax < 0.0 || tax < min || tax > max {
        issues.push(ValidationIssue::new(
            "a_skat",
            IssueType::UnusualValue,
            Severity::Warning,
            format!(
                "A-skat ({tax:.2}) ser usædvanlig ud ift. bruttoløn ({gross:.2}). Forventet interval ca. {:.0}-{:.0}% og positivt.",
                rules.min_tax_rate * 100.0,
                rules.max_tax_rate * 100.0
            ),
        ));
    }
}

/// Compared by absolute value: the contribution is often written as a
/// negative deduction.
fn check_labor_market(
    record: &PayslipRecord,
    gross: f64,
    rules: &ValidationRules,
    issues: &mut Vec<ValidationIssue>,
) {
    let am = record.first_number(paths::LABOR_MARKET).unwrap_or(0.0);
    let expected = gross * rules.labor_market_rate;
    let tolerance = rules
        .rounding_tolerance
        .max(expected * rules.labor_market_relative_tolerance);
    if (am.abs() - expected).abs() > tolerance {
        issues.push(ValidationIssue::new(
            "am_bidrag",
            IssueType::IncorrectValue,
            Severity::Warning,
            format!(
                "AM-bidrag ({am:.2}) er ikke tæt på {:.0}% af bruttoløn ({expected:.2}).",
                rules.labor_market_rate * 100.0
            ),
        ));
    }
}
