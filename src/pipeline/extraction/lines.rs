use super::types::{Line, WordToken};
use crate::pipeline_config::LayoutConfig;

/// Group word tokens into text lines by vertical proximity.
///
/// Tokens are walked top to bottom. A token joins the current line while its
/// vertical center stays within the page threshold of the line's first token
/// (the anchor, not a running mean). The threshold adapts to the page:
/// `max(min_line_threshold, line_height_factor × average word height)`.
pub fn group_lines(tokens: &[WordToken], config: &LayoutConfig) -> Vec<Line> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&WordToken> = tokens.iter().collect();
    sorted.sort_by(|a, b| a.center_y.total_cmp(&b.center_y));

    let threshold = line_threshold(tokens, config);

    let mut lines = Vec::new();
    let mut current: Vec<WordToken> = Vec::new();
    let mut anchor_y = sorted[0].center_y;

    for token in sorted {
        if !current.is_empty() && (token.center_y - anchor_y).abs() > threshold {
            lines.push(Line::from_words(std::mem::take(&mut current)));
        }
        if current.is_empty() {
            anchor_y = token.center_y;
        }
        current.push(token.clone());
    }
    if !current.is_empty() {
        lines.push(Line::from_words(current));
    }

    tracing::debug!(
        tokens = tokens.len(),
        lines = lines.len(),
        threshold,
        "Grouped words into lines"
    );

    lines
}

fn line_threshold(tokens: &[WordToken], config: &LayoutConfig) -> f64 {
    let average_height = tokens.iter().map(|t| t.height).sum::<f64>() / tokens.len() as f64;
    (config.line_height_factor * average_height).max(config.min_line_threshold)
}
