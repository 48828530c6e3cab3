//! Pipeline diagnostic dump: writes intermediate artifacts to disk.
//!
//! **Activation** (see `Settings::diagnostic_dir`):
//! - `PAYTJEK_DUMP_DIR` set: always enabled, writes there
//! - debug mode: writes to `~/PayTjek/diagnostic/`
//! - otherwise disabled
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{doc_id}/
//!   00-ocr-export.json
//!   01-document-text.txt
//!   02-extraction-prompt.txt
//!   03-model-response.txt
//!   04-record.json
//!   05-validation.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const OCR_EXPORT_FILE: &str = "00-ocr-export.json";
pub const DOCUMENT_TEXT_FILE: &str = "01-document-text.txt";
pub const PROMPT_FILE: &str = "02-extraction-prompt.txt";
pub const MODEL_RESPONSE_FILE: &str = "03-model-response.txt";
pub const RECORD_FILE: &str = "04-record.json";
pub const VALIDATION_FILE: &str = "05-validation.json";

/// Returns the dump directory for a document, or `None` if diagnostics are
/// disabled (`base` is `None`).
///
/// Creates the directory tree on first call. Returns `None` (with a warning) if
/// directory creation fails. Never panics, never blocks the pipeline.
pub fn dump_dir_for(base: Option<&Path>, doc_id: &Uuid) -> Option<PathBuf> {
    let dir = base?.join(doc_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

/// Write a JSON artifact (any serde-serializable value), pretty-printed.
/// Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(&path, json.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = json.len(),
                "Diagnostic dump: JSON written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write JSON"
            ),
        },
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

/// Write a text artifact (document text, prompt, raw model response).
/// Never panics.
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Diagnostic dump: text written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write text"
        ),
    }
}
