// Repair near-JSON model output and parse it into a payslip record.
// Strict JSON first, then a permissive literal evaluator; the final error
// carries both failures.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::literal::{parse_literal, substitute_literal_tokens};
use super::ParsingError;
use crate::pipeline::record::PayslipRecord;

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[\]}])").unwrap());

/// `31.805.89` style numbers with more than one dot.
static MULTI_DOT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+){2,}").unwrap());

/// Parse raw model output into a record.
pub fn sanitize_and_parse(raw: &str) -> Result<PayslipRecord, ParsingError> {
    let cleaned = clean_model_output(raw);

    let strict_error = match serde_json::from_str::<serde_json::Value>(&cleaned) {
        Ok(value) => return Ok(PayslipRecord::new(value)),
        Err(e) => e.to_string(),
    };
    tracing::warn!(error = %strict_error, "Strict JSON parse failed, trying relaxed parse");

    match parse_literal(&substitute_literal_tokens(&cleaned)) {
        Ok(value) => {
            tracing::info!("Relaxed parse recovered model output");
            Ok(PayslipRecord::new(value))
        }
        Err(relaxed) => {
            tracing::error!(
                strict_error = %strict_error,
                relaxed_error = %relaxed,
                "Model output could not be parsed"
            );
            Err(ParsingError {
                cleaned,
                strict_error,
                relaxed_error: relaxed.to_string(),
            })
        }
    }
}

/// All textual repairs, in order: code fences, comments, trailing commas,
/// control characters, multi-dot numbers.
pub fn clean_model_output(raw: &str) -> String {
    let text = strip_code_fences(raw);
    let text = strip_comments(&text);
    let text = TRAILING_COMMA.replace_all(&text, "$1").into_owned();
    let text = strip_control_chars(&text);
    collapse_multi_dot_numbers(&text)
}

pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim().to_string()
}

/// Remove `//` line comments and `/* */` block comments outside string
/// literals.
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match (c, chars.get(i + 1)) {
            ('"' | '\'', _) => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Drop non-printable control characters, keeping newline, carriage return
/// and tab.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// `31.805.89` → `31805.89`: only the last dot is a decimal point. String
/// literals are left alone so dotted dates survive.
pub fn collapse_multi_dot_numbers(text: &str) -> String {
    map_outside_strings(text, |segment| {
        MULTI_DOT_NUMBER
            .replace_all(segment, |caps: &Captures| {
                let number = &caps[0];
                match number.rsplit_once('.') {
                    Some((whole, fraction)) => format!("{}.{}", whole.replace('.', ""), fraction),
                    None => number.to_string(),
                }
            })
            .into_owned()
    })
}

fn map_outside_strings(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment_start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    out.push_str(&text[segment_start..i + 1]);
                    segment_start = i + 1;
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                out.push_str(&f(&text[segment_start..i]));
                segment_start = i;
                quote = Some(c);
            }
            None => {}
        }
    }

    let rest = &text[segment_start..];
    if quote.is_some() {
        out.push_str(rest);
    } else {
        out.push_str(&f(rest));
    }
    out
}
