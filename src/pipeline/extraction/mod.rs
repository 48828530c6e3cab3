pub mod types;
pub mod words;
pub mod lines;
pub mod headings;
pub mod table_detect;
pub mod assemble;
pub mod postprocess;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use ocr::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR engine not found: {0}")]
    OcrEngineNotFound(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Invalid OCR export: {0}")]
    OcrExport(String),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),
}
