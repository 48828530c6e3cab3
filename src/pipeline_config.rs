//! Tunable thresholds for layout reconstruction and payroll validation.
//!
//! The layout values were chosen empirically against Danish public-sector
//! payslips and may need retuning for other document corpora, so they travel
//! as explicit configuration instead of module constants. Both structs
//! deserialize from JSON with every field optional.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════
// Layout
// ═══════════════════════════════════════════════════════════

/// Thresholds used by the line grouper, heading detector and table detector.
///
/// All distances are in page-relative coordinates (0.0..=1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Line threshold as a multiple of the page's average word height.
    pub line_height_factor: f64,
    /// Lower bound for the line threshold.
    pub min_line_threshold: f64,
    /// Horizontal distance under which two word centers count as aligned,
    /// and at which a new table column starts.
    pub column_tolerance: f64,
    /// Alignment score a line pair must exceed to continue a table.
    pub min_alignment_score: f64,
    /// The earlier line of a pair needs more than this many words.
    pub min_row_words: usize,
    /// Maximum word-count difference between adjacent table rows.
    pub max_word_count_delta: usize,
    /// Minimum number of rows for a run to become a table.
    pub min_table_rows: usize,
    /// Headings shorter than this are rendered in banner form.
    pub short_heading_chars: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_height_factor: 0.7,
            min_line_threshold: 0.01,
            column_tolerance: 0.03,
            min_alignment_score: 0.6,
            min_row_words: 2,
            max_word_count_delta: 1,
            min_table_rows: 2,
            short_heading_chars: 30,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════

/// Statutory percentages and tolerances checked by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    /// Minimum vacation pay as a share of gross pay (feriepenge).
    pub vacation_pay_rate: f64,
    /// Absolute rounding allowance in currency units.
    pub rounding_tolerance: f64,
    /// Lowest plausible income tax share (A-skat).
    pub min_tax_rate: f64,
    /// Highest plausible income tax share (A-skat).
    pub max_tax_rate: f64,
    /// Labor-market contribution share (AM-bidrag).
    pub labor_market_rate: f64,
    /// Relative tolerance for the labor-market contribution.
    pub labor_market_relative_tolerance: f64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            vacation_pay_rate: 0.125,
            rounding_tolerance: 1.0,
            min_tax_rate: 0.30,
            max_tax_rate: 0.55,
            labor_market_rate: 0.08,
            labor_market_relative_tolerance: 0.10,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_defaults() {
        let config = LayoutConfig::default();
        assert!((config.line_height_factor - 0.7).abs() < f64::EPSILON);
        assert!((config.min_line_threshold - 0.01).abs() < f64::EPSILON);
        assert!((config.column_tolerance - 0.03).abs() < f64::EPSILON);
        assert!((config.min_alignment_score - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.min_table_rows, 2);
        assert_eq!(config.short_heading_chars, 30);
    }

    #[test]
    fn validation_defaults() {
        let rules = ValidationRules::default();
        assert!((rules.vacation_pay_rate - 0.125).abs() < f64::EPSILON);
        assert!((rules.labor_market_rate - 0.08).abs() < f64::EPSILON);
        assert!(rules.min_tax_rate < rules.max_tax_rate);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: LayoutConfig =
            serde_json::from_str(r#"{"column_tolerance": 0.05}"#).unwrap();
        assert!((config.column_tolerance - 0.05).abs() < f64::EPSILON);
        assert!((config.min_alignment_score - 0.6).abs() < f64::EPSILON);

        let rules: ValidationRules = serde_json::from_str(r#"{"max_tax_rate": 0.6}"#).unwrap();
        assert!((rules.max_tax_rate - 0.6).abs() < f64::EPSILON);
        assert!((rules.min_tax_rate - 0.30).abs() < f64::EPSILON);
    }
}
