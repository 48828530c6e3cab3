use super::types::{Line, TableBlock};
use crate::pipeline_config::LayoutConfig;

/// Render one page of reconstructed layout as text.
///
/// `page_number` is 1-based; every page after the first opens with a
/// separator banner. Tables come first, in discovery order, followed by the
/// remaining lines in reading order. Tables are not interleaved with the
/// body text around them.
pub fn render_page(
    page_number: usize,
    lines: &[Line],
    tables: &[TableBlock],
    config: &LayoutConfig,
) -> String {
    let mut out: Vec<String> = Vec::new();

    if page_number > 1 {
        out.push(page_banner(page_number));
    }

    out.extend(tables.iter().map(|t| t.rendered_text.clone()));

    for line in lines.iter().filter(|l| !l.in_table) {
        if line.is_heading {
            out.push(render_heading(&line.text, config.short_heading_chars));
        } else {
            out.push(line.text.clone());
        }
    }

    out.join("\n")
}

/// Join rendered pages in page order.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n")
}

pub fn page_banner(page_number: usize) -> String {
    format!("--- PAGE {page_number} ---")
}

/// `## TEXT ##` for uppercase or short headings, `# text` otherwise.
pub fn render_heading(text: &str, short_heading_chars: usize) -> String {
    if is_all_uppercase(text) || text.chars().count() < short_heading_chars {
        format!("## {} ##", text.to_uppercase())
    } else {
        format!("# {text}")
    }
}

fn is_all_uppercase(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}
