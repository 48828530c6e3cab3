//! Text normalization applied to the assembled document before it is sent
//! to the language model.
//!
//! Every step maps its own output to itself, so the whole pass is
//! idempotent. Spaces are matched as `[ \t]`, never `\s`, so no rule joins
//! tokens across line breaks.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Danish amounts: `24.559,41`, `24 559,41`, `-161,18`.
static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\d,.])(\d{1,3}(?:(?:\.| )\d{3})+|\d+),(\d{2})\b").unwrap()
});

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:[,.](\d+))?[ \t]*%").unwrap());

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[ \t]*([.-])[ \t]*(\d{1,2})[ \t]*([.-])[ \t]*(\d{4})\b").unwrap()
});

/// Danish CPR number, `DDMMYY-SSSS`.
static CPR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{6})[ \t]*-?[ \t]*(\d{4})\b").unwrap());

/// `7.00 - 15.30`. Context checks in `normalize_time_ranges` keep date
/// ranges and longer numbers out.
static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d{1,2})[ \t]*([:.])[ \t]*(\d{2})[ \t]*-[ \t]*(\d{1,2})[ \t]*([:.])[ \t]*(\d{2})",
    )
    .unwrap()
});

static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
static MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Section-start patterns, in insertion order.
static SECTIONS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("LØNSEDDEL", Regex::new(r"(?i)lønseddel").unwrap()),
        ("LØN", Regex::new(r"(?i)\b(fast løn|grundløn|løn i alt)\b").unwrap()),
        ("SÆRYDELSER", Regex::new(r"(?i)særydelser").unwrap()),
        ("SKAT", Regex::new(r"(?i)\b(a-skat|skatteberegning|trækprocent)").unwrap()),
        ("PENSION", Regex::new(r"(?i)pension").unwrap()),
        ("FERIE", Regex::new(r"(?i)\bferie").unwrap()),
        ("AFSPADSERING", Regex::new(r"(?i)afspadsering").unwrap()),
        ("ARBEJDSTIMER", Regex::new(r"(?i)arbejdstid|optælling af timer").unwrap()),
    ]
});

/// Run all normalization steps in order.
pub fn postprocess(text: &str) -> String {
    let text = normalize_money(text);
    let text = normalize_percentages(&text);
    let text = normalize_dates(&text);
    let text = normalize_cpr(&text);
    let text = normalize_time_ranges(&text);
    let text = collapse_whitespace(&text);
    insert_section_markers(&text)
}

pub fn normalize_money(text: &str) -> String {
    MONEY
        .replace_all(text, |caps: &Captures| {
            format!("{}{}.{}", &caps[1], caps[2].replace(['.', ' '], ""), &caps[3])
        })
        .into_owned()
}

pub fn normalize_percentages(text: &str) -> String {
    PERCENT
        .replace_all(text, |caps: &Captures| match caps.get(2) {
            Some(fraction) => format!("{}.{}%", &caps[1], fraction.as_str()),
            None => format!("{}%", &caps[1]),
        })
        .into_owned()
}

pub fn normalize_dates(text: &str) -> String {
    DATE.replace_all(text, "$1$2$3$4$5").into_owned()
}

pub fn normalize_cpr(text: &str) -> String {
    CPR.replace_all(text, |caps: &Captures| match caps.get(0) {
        Some(m) if is_isolated(text, m.start(), m.end()) => format!("{}-{}", &caps[1], &caps[2]),
        _ => caps[0].to_string(),
    })
    .into_owned()
}

/// `hh.mm - hh.mm` → `hh:mm-hh:mm`. Left alone when the match is part of a
/// longer number, when either side is not a clock value, or when both sides
/// are dot-separated day.month pairs (`01.08 - 15.08`).
pub fn normalize_time_ranges(text: &str) -> String {
    TIME_RANGE
        .replace_all(text, |caps: &Captures| {
            let keep = match caps.get(0) {
                Some(m) => !is_isolated(text, m.start(), m.end()),
                None => true,
            };
            if keep
                || is_day_month_range(caps)
                || !is_clock(&caps[1], &caps[3])
                || !is_clock(&caps[4], &caps[6])
            {
                return caps[0].to_string();
            }
            format!("{}:{}-{}:{}", &caps[1], &caps[3], &caps[4], &caps[6])
        })
        .into_owned()
}

/// No digit or decimal separator directly before `start`, and no digit or
/// separator-plus-digit directly after `end`.
fn is_isolated(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    if matches!(before, Some(c) if c.is_ascii_digit() || c == '.' || c == ',') {
        return false;
    }
    let mut after = text[end..].chars();
    match after.next() {
        Some(c) if c.is_ascii_digit() => false,
        Some('.' | ',' | ':') => !matches!(after.next(), Some(c) if c.is_ascii_digit()),
        _ => true,
    }
}

fn is_day_month_range(caps: &Captures) -> bool {
    &caps[2] == "."
        && &caps[5] == "."
        && is_day_month(&caps[1], &caps[3])
        && is_day_month(&caps[4], &caps[6])
}

fn is_day_month(day: &str, month: &str) -> bool {
    matches!(
        (day.parse::<u32>(), month.parse::<u32>()),
        (Ok(d), Ok(m)) if (1..=31).contains(&d) && (1..=12).contains(&m)
    )
}

fn is_clock(hours: &str, minutes: &str) -> bool {
    matches!(
        (hours.parse::<u32>(), minutes.parse::<u32>()),
        (Ok(h), Ok(m)) if h <= 24 && m < 60
    )
}

pub fn collapse_whitespace(text: &str) -> String {
    let text = MULTI_SPACE.replace_all(text, " ");
    MULTI_NEWLINE.replace_all(&text, "\n\n").into_owned()
}

pub fn section_marker(name: &str) -> String {
    format!("[SEKTION:{name}]")
}

/// Insert a marker line before the first line matching each section
/// pattern. Later matches of the same pattern stay unmarked, and a marker
/// already present is never added twice.
pub fn insert_section_markers(text: &str) -> String {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

    for (name, pattern) in SECTIONS.iter() {
        let marker = section_marker(name);
        if lines.iter().any(|l| l.trim() == marker) {
            continue;
        }
        let first = lines
            .iter()
            .position(|l| !is_marker_line(l) && pattern.is_match(l));
        if let Some(index) = first {
            lines.insert(index, marker);
        }
    }

    lines.join("\n")
}

fn is_marker_line(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("[SEKTION:") && line.ends_with(']')
}
