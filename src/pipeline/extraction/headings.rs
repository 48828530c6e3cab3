use std::sync::LazyLock;

use regex::Regex;

use super::types::Line;

/// Section names and column headers found on Danish payslips, matched
/// against the lowercased line text.
static HEADING_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Section names
        Regex::new(r"\blønseddel\b").unwrap(),
        Regex::new(r"\bperiode\b").unwrap(),
        Regex::new(r"\bfast løn\b").unwrap(),
        Regex::new(r"\bsærydelser\b").unwrap(),
        Regex::new(r"\bspecifikation af\b").unwrap(),
        Regex::new(r"\bskatteberegning\b").unwrap(),
        Regex::new(r"\barbejdstidsopgørelse\b").unwrap(),
        Regex::new(r"\boptælling af timer\b").unwrap(),
        Regex::new(r"\bferieregnskab\b").unwrap(),
        Regex::new(r"\bferiegodtgørelser\b").unwrap(),
        Regex::new(r"\bafspadseringsregnskab\b").unwrap(),
        Regex::new(r"\btilgodehavende afspadsering\b").unwrap(),
        // Currency and time column headers
        Regex::new(r"\bbeløb\b").unwrap(),
        Regex::new(r"\bsats\b").unwrap(),
        Regex::new(r"\bdkk\b").unwrap(),
        Regex::new(r"\bnormtid\b").unwrap(),
        Regex::new(r"\bfra\s*-?\s*til\b").unwrap(),
    ]
});

/// "12 Tillæg ..." style numbered headers.
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\s+\p{L}").unwrap());

/// "... Løntrin 4" style column headers.
static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}\s+\d+$").unwrap());

/// Why a line was classified as a heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingReason {
    Keyword,
    UppercaseWord,
    NumberedLabel,
}

/// Mark every line whose text looks like a heading.
pub fn detect_headings(lines: &mut [Line]) {
    for line in lines.iter_mut() {
        line.is_heading = is_heading_text(&line.text);
    }
    tracing::debug!(
        headings = lines.iter().filter(|l| l.is_heading).count(),
        lines = lines.len(),
        "Heading detection done"
    );
}

pub fn is_heading_text(text: &str) -> bool {
    !heading_reasons(text).is_empty()
}

/// All heuristics a line satisfies. Any single one makes it a heading.
pub fn heading_reasons(text: &str) -> Vec<HeadingReason> {
    let mut reasons = Vec::new();
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if HEADING_KEYWORDS.iter().any(|re| re.is_match(&lower)) {
        reasons.push(HeadingReason::Keyword);
    }
    if trimmed.split_whitespace().any(is_uppercase_word) {
        reasons.push(HeadingReason::UppercaseWord);
    }
    if LEADING_NUMBER.is_match(trimmed) || TRAILING_NUMBER.is_match(trimmed) {
        reasons.push(HeadingReason::NumberedLabel);
    }

    reasons
}

/// Longer than two characters, has cased letters, and none of them lowercase.
fn is_uppercase_word(word: &str) -> bool {
    word.chars().count() > 2
        && word.chars().any(char::is_uppercase)
        && !word.chars().any(char::is_lowercase)
}
