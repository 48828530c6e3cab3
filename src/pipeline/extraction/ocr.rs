use std::path::{Path, PathBuf};
use std::process::Command;

use super::types::{OcrBlock, OcrDocument, OcrEngine, OcrLine, OcrPage, OcrWord};
use super::ExtractionError;

/// Image extensions the Tesseract CLI reads directly.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Tesseract invoked as an external process, producing TSV output.
///
/// PDFs are not rasterized here; pass page images or use a pre-computed
/// OCR export instead.
pub struct TesseractCli {
    binary: PathBuf,
    languages: String,
}

impl TesseractCli {
    /// Find `tesseract` on `PATH`. Danish plus English by default.
    pub fn locate() -> Result<Self, ExtractionError> {
        let binary = which::which("tesseract")
            .map_err(|e| ExtractionError::OcrEngineNotFound(e.to_string()))?;
        tracing::info!(binary = %binary.display(), "Tesseract found");
        Ok(Self::with_binary(binary))
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            languages: "dan+eng".to_string(),
        }
    }

    /// Set language(s) for OCR (e.g. "dan", "dan+eng").
    pub fn with_languages(mut self, languages: &str) -> Self {
        self.languages = languages.to_string();
        self
    }
}

impl OcrEngine for TesseractCli {
    fn reads_pdf(&self) -> bool {
        false
    }

    fn process(&self, path: &Path) -> Result<OcrDocument, ExtractionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ExtractionError::UnsupportedFormat(format!(
                "Tesseract CLI reads images only, got .{extension}"
            )));
        }

        let output = Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("tsv")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let page = parse_tsv_page(&tsv);
        let words: usize = page.blocks.iter().flat_map(|b| &b.lines).map(|l| l.words.len()).sum();
        tracing::debug!(path = %path.display(), words, "Tesseract page processed");

        Ok(OcrDocument { pages: vec![page] })
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    document: Option<OcrDocument>,
    failure: Option<String>,
}

impl MockOcrEngine {
    pub fn new(document: OcrDocument) -> Self {
        Self {
            document: Some(document),
            failure: None,
        }
    }

    /// Single page, one OCR line per row, words spread left to right.
    pub fn from_rows(rows: &[&str]) -> Self {
        let lines = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let y = 0.05 + i as f64 * 0.04;
                let words = row
                    .split_whitespace()
                    .enumerate()
                    .map(|(j, w)| {
                        let x = 0.05 + j as f64 * 0.12;
                        OcrWord::with_box(w, x, y, x + 0.1, y + 0.02)
                    })
                    .collect();
                OcrLine { words }
            })
            .collect();
        Self::new(OcrDocument {
            pages: vec![OcrPage {
                blocks: vec![OcrBlock { lines }],
            }],
        })
    }

    pub fn failing(message: &str) -> Self {
        Self {
            document: None,
            failure: Some(message.to_string()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn process(&self, _path: &Path) -> Result<OcrDocument, ExtractionError> {
        match (&self.document, &self.failure) {
            (_, Some(message)) => Err(ExtractionError::OcrProcessing(message.clone())),
            (Some(document), None) => Ok(document.clone()),
            (None, None) => Ok(OcrDocument::default()),
        }
    }
}

struct TsvWord {
    block: u32,
    line: (u32, u32),
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    confidence: f32,
    text: String,
}

/// Parse Tesseract TSV output into one OCR page.
///
/// TSV columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Level 1 carries the page size used to normalize
/// pixel boxes to 0..1; level 5 rows are words. Words are grouped into
/// blocks by `block_num` and into lines by `(par_num, line_num)`.
pub fn parse_tsv_page(tsv: &str) -> OcrPage {
    let mut page_size: Option<(f64, f64)> = None;
    let mut words: Vec<TsvWord> = Vec::new();

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        let Ok(level) = fields[0].parse::<i32>() else {
            continue;
        };
        let numbers: Option<Vec<f64>> = fields[6..10].iter().map(|f| f.parse().ok()).collect();
        let Some(numbers) = numbers else {
            continue;
        };

        match level {
            1 => page_size = Some((numbers[2], numbers[3])),
            5 => {
                let text = fields[11].trim();
                if text.is_empty() {
                    continue;
                }
                let (Ok(block), Ok(par), Ok(line)) = (
                    fields[2].parse::<u32>(),
                    fields[3].parse::<u32>(),
                    fields[4].parse::<u32>(),
                ) else {
                    continue;
                };
                // Tesseract returns -1 for words it can't assign confidence to
                let conf = fields[10].parse::<f32>().unwrap_or(-1.0);
                words.push(TsvWord {
                    block,
                    line: (par, line),
                    left: numbers[0],
                    top: numbers[1],
                    width: numbers[2],
                    height: numbers[3],
                    confidence: if conf < 0.0 { 0.0 } else { conf / 100.0 },
                    text: text.to_string(),
                });
            }
            _ => {}
        }
    }

    let (page_width, page_height) = match page_size {
        Some((w, h)) if w > 0.0 && h > 0.0 => (w, h),
        _ => (
            words.iter().map(|w| w.left + w.width).fold(1.0, f64::max),
            words.iter().map(|w| w.top + w.height).fold(1.0, f64::max),
        ),
    };

    let mut page = OcrPage::default();
    let mut last_block: Option<u32> = None;
    let mut last_line: Option<(u32, u32)> = None;

    for word in words {
        if last_block != Some(word.block) {
            page.blocks.push(OcrBlock::default());
            last_block = Some(word.block);
            last_line = None;
        }
        let Some(block) = page.blocks.last_mut() else {
            continue;
        };
        if last_line != Some(word.line) {
            block.lines.push(OcrLine::default());
            last_line = Some(word.line);
        }
        let Some(line) = block.lines.last_mut() else {
            continue;
        };

        let mut ocr_word = OcrWord::with_box(
            &word.text,
            word.left / page_width,
            word.top / page_height,
            (word.left + word.width) / page_width,
            (word.top + word.height) / page_height,
        );
        ocr_word.confidence = Some(word.confidence);
        line.words.push(ocr_word);
    }

    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::BoundingBox;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn mock_returns_configured_document() {
        let engine = MockOcrEngine::from_rows(&["Grundløn 24559.41", "Tillæg 1751.08"]);
        let doc = engine.process(Path::new("ignored.png")).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.word_count(), 4);
    }

    #[test]
    fn failing_mock_surfaces_error() {
        let engine = MockOcrEngine::failing("scanner jam");
        let result = engine.process(Path::new("ignored.png"));
        assert!(matches!(result, Err(ExtractionError::OcrProcessing(m)) if m == "scanner jam"));
    }

    #[test]
    fn cli_rejects_pdf_before_spawning() {
        let engine = TesseractCli::with_binary(PathBuf::from("/nonexistent/tesseract"));
        let result = engine.process(Path::new("payslip.pdf"));
        assert!(matches!(result, Err(ExtractionError::UnsupportedFormat(_))));
    }

    #[test]
    fn cli_reports_image_only_support() {
        let engine = TesseractCli::with_binary(PathBuf::from("tesseract"));
        assert!(!engine.reads_pdf());
        assert!(MockOcrEngine::from_rows(&[]).reads_pdf());
    }

    #[test]
    fn cli_with_missing_binary_is_io_error() {
        let engine = TesseractCli::with_binary(PathBuf::from("/nonexistent/tesseract"));
        let result = engine.process(Path::new("payslip.png"));
        assert!(matches!(result, Err(ExtractionError::Io(_))));
    }

    #[test]
    fn tsv_words_grouped_and_normalized() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t1000\t2000\t-1\t\n\
             2\t1\t1\t0\t0\t0\t100\t200\t800\t100\t-1\t\n\
             5\t1\t1\t1\t1\t1\t100\t200\t200\t40\t95\tGrundløn\n\
             5\t1\t1\t1\t1\t2\t400\t200\t200\t40\t88\t24.559,41\n\
             5\t1\t1\t1\t2\t1\t100\t260\t150\t40\t-1\tTillæg\n\
             5\t1\t2\t1\t1\t1\t100\t600\t300\t40\t91\tFerieregnskab"
        );
        let page = parse_tsv_page(&tsv);

        assert_eq!(page.blocks.len(), 2);
        assert_eq!(page.blocks[0].lines.len(), 2);
        assert_eq!(page.blocks[0].lines[0].words.len(), 2);
        assert_eq!(page.blocks[1].lines[0].words[0].value, "Ferieregnskab");

        let first = &page.blocks[0].lines[0].words[0];
        let bb = BoundingBox::from_geometry(first.geometry.as_ref().unwrap()).unwrap();
        assert!((bb.x1 - 0.1).abs() < 1e-9);
        assert!((bb.y1 - 0.1).abs() < 1e-9);
        assert!((bb.x2 - 0.3).abs() < 1e-9);
        assert!((bb.y2 - 0.12).abs() < 1e-9);
        assert!((first.confidence.unwrap() - 0.95).abs() < f32::EPSILON);

        let unsure = &page.blocks[0].lines[1].words[0];
        assert_eq!(unsure.confidence, Some(0.0));
    }

    #[test]
    fn tsv_without_page_row_uses_word_extent() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t0\t0\t50\t10\t90\tvenstre\n\
             5\t1\t1\t1\t1\t2\t150\t0\t50\t10\t90\thøjre"
        );
        let page = parse_tsv_page(&tsv);
        let right = &page.blocks[0].lines[0].words[1];
        let bb = BoundingBox::from_geometry(right.geometry.as_ref().unwrap()).unwrap();
        assert!((bb.x2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tsv_skips_empty_and_malformed_rows() {
        let tsv = format!(
            "{HEADER}\n\
             too\tfew\tfields\n\
             5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t90\t\n\
             notanumber\t1\t1\t1\t1\t1\t10\t20\t80\t30\t50\tbad\n\
             5\t1\t1\t1\t1\t2\t100\t20\t80\t30\t85\tgyldig"
        );
        let page = parse_tsv_page(&tsv);
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].lines[0].words.len(), 1);
        assert_eq!(page.blocks[0].lines[0].words[0].value, "gyldig");
    }

    #[test]
    fn tsv_empty_input_gives_empty_page() {
        assert!(parse_tsv_page("").blocks.is_empty());
        assert!(parse_tsv_page(HEADER).blocks.is_empty());
    }
}
