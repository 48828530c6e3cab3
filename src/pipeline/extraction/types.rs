use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

// ──────────────────────────────────────────────
// OCR export (engine boundary)
// ──────────────────────────────────────────────

/// Hierarchical OCR output: pages → blocks → lines → words.
///
/// Mirrors the JSON export of common OCR engines. Unknown fields are ignored
/// and every level defaults to empty, so partial exports still load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrDocument {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
}

impl OcrDocument {
    /// Parse an OCR export from its JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ExtractionError> {
        serde_json::from_str(json).map_err(|e| ExtractionError::OcrExport(e.to_string()))
    }

    /// Load an OCR export from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ExtractionError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.lines)
            .map(|l| l.words.len())
            .sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub blocks: Vec<OcrBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrBlock {
    #[serde(default)]
    pub lines: Vec<OcrLine>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrLine {
    #[serde(default)]
    pub words: Vec<OcrWord>,
}

/// A single recognized word.
///
/// `geometry` is kept as raw JSON: engines disagree on its shape, and a
/// malformed box must only drop this word, never the whole export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrWord {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl OcrWord {
    /// Word with a two-point `[[x1, y1], [x2, y2]]` geometry.
    pub fn with_box(value: &str, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            value: value.to_string(),
            geometry: Some(serde_json::json!([[x1, y1], [x2, y2]])),
            confidence: None,
        }
    }
}

// ──────────────────────────────────────────────
// Layout reconstruction types
// ──────────────────────────────────────────────

/// Page-relative rectangle, coordinates in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Read a box from OCR geometry.
    ///
    /// Accepts a list of `[x, y]` points (two corners or a polygon, reduced to
    /// its enclosing rectangle) or a flat `[x1, y1, x2, y2]` list. Returns
    /// `None` for anything else, including non-finite coordinates.
    pub fn from_geometry(geometry: &serde_json::Value) -> Option<Self> {
        let items = geometry.as_array()?;

        let points: Vec<(f64, f64)> = if items.iter().all(|v| v.is_number()) {
            if items.len() != 4 {
                return None;
            }
            let n: Vec<f64> = items.iter().filter_map(|v| v.as_f64()).collect();
            vec![(n[0], n[1]), (n[2], n[3])]
        } else {
            items
                .iter()
                .map(|p| {
                    let pair = p.as_array()?;
                    if pair.len() != 2 {
                        return None;
                    }
                    Some((pair[0].as_f64()?, pair[1].as_f64()?))
                })
                .collect::<Option<Vec<_>>>()?
        };

        if points.len() < 2 || points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return None;
        }

        let x1 = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let y1 = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let x2 = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let y2 = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        Some(Self { x1, y1, x2, y2 })
    }
}

/// A positioned word. Derived geometry is computed once at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordToken {
    pub text: String,
    pub bounding_box: BoundingBox,
    pub block_index: usize,
    pub line_index: usize,
    pub word_index: usize,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl WordToken {
    pub fn new(
        text: &str,
        bounding_box: BoundingBox,
        block_index: usize,
        line_index: usize,
        word_index: usize,
    ) -> Self {
        let BoundingBox { x1, y1, x2, y2 } = bounding_box;
        Self {
            text: text.to_string(),
            bounding_box,
            block_index,
            line_index,
            word_index,
            center_x: (x1 + x2) / 2.0,
            center_y: (y1 + y2) / 2.0,
            width: x2 - x1,
            height: y2 - y1,
        }
    }
}

/// A reconstructed text line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    /// Words ordered left to right.
    pub words: Vec<WordToken>,
    /// Mean vertical center of the words.
    pub vertical_position: f64,
    pub text: String,
    pub is_heading: bool,
    pub in_table: bool,
}

impl Line {
    /// Build a line from its words, ordering them by left edge.
    pub fn from_words(mut words: Vec<WordToken>) -> Self {
        words.sort_by(|a, b| a.bounding_box.x1.total_cmp(&b.bounding_box.x1));
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let vertical_position = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.center_y).sum::<f64>() / words.len() as f64
        };

        Self {
            words,
            vertical_position,
            text,
            is_heading: false,
            in_table: false,
        }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// A grid reconstructed from a run of aligned lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableBlock {
    pub rows: Vec<Vec<String>>,
    pub column_positions: Vec<f64>,
    pub rendered_text: String,
    /// Indices of the originating lines within the page.
    pub line_indices: Vec<usize>,
}

/// OCR engine abstraction (allows mocking for tests).
pub trait OcrEngine {
    /// Run OCR over a document file (PDF or image).
    fn process(&self, path: &Path) -> Result<OcrDocument, ExtractionError>;

    /// Whether `process` accepts PDF files. Callers reject PDF uploads up
    /// front for engines that read images only.
    fn reads_pdf(&self) -> bool {
        true
    }
}
