use super::assemble::{join_pages, render_page};
use super::headings::detect_headings;
use super::lines::group_lines;
use super::postprocess::postprocess;
use super::table_detect::detect_tables;
use super::types::{Line, OcrDocument, OcrPage, TableBlock};
use super::words::extract_words;
use crate::pipeline_config::LayoutConfig;

/// Layout analysis of a single page, before rendering.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub lines: Vec<Line>,
    pub tables: Vec<TableBlock>,
}

/// Rebuilds readable text from positioned OCR words.
///
/// Holds only configuration, so one instance can serve any number of
/// documents concurrently.
#[derive(Debug, Clone, Default)]
pub struct LayoutReconstructor {
    config: LayoutConfig,
}

impl LayoutReconstructor {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Words → lines → headings → tables for one page.
    pub fn analyze_page(&self, page: &OcrPage) -> PageLayout {
        let tokens = extract_words(page);
        let mut lines = group_lines(&tokens, &self.config);
        detect_headings(&mut lines);
        let tables = detect_tables(&mut lines, &self.config);
        PageLayout { lines, tables }
    }

    /// Assembled and post-processed text for a whole document.
    ///
    /// Pages are analyzed independently and concatenated in page order.
    pub fn reconstruct(&self, document: &OcrDocument) -> String {
        let pages: Vec<String> = document
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let layout = self.analyze_page(page);
                render_page(i + 1, &layout.lines, &layout.tables, &self.config)
            })
            .collect();

        let text = postprocess(&join_pages(&pages));

        tracing::info!(
            pages = document.pages.len(),
            words = document.word_count(),
            chars = text.len(),
            "Layout reconstruction complete"
        );

        text
    }
}

/// Reconstruct with the given thresholds.
pub fn reconstruct(document: &OcrDocument, config: &LayoutConfig) -> String {
    LayoutReconstructor::new(config.clone()).reconstruct(document)
}
