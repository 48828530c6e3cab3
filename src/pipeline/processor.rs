//! Payslip processing orchestrator.
//!
//! Single entry point that drives the full pipeline:
//! upload check → stage → OCR → layout reconstruction → extraction →
//! sanitize/normalize → validate.
//!
//! Uses trait-based DI for the OCR engine and the LLM client so the
//! orchestrator remains fully testable with mock implementations. Holds no
//! per-request state: one processor serves any number of concurrent uploads.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::pipeline::diagnostic::{self, dump_json, dump_text};
use crate::pipeline::extraction::{ExtractionError, LayoutReconstructor, OcrDocument, OcrEngine};
use crate::pipeline::import::{check_upload, stage_upload, ImportError, UploadFormat};
use crate::pipeline::record::PayslipRecord;
use crate::pipeline::structuring::{
    NumericCoercionWarning, PayslipStructurer, StructuringError, StructuringOutcome,
};
use crate::pipeline::validation::{validate, ValidationOutcome};
use crate::pipeline_config::{LayoutConfig, ValidationRules};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort processing of one upload.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Structuring failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Everything returned to the caller for one payslip.
#[derive(Debug, Clone, Serialize)]
pub struct PayslipAnalysis {
    pub document_id: Uuid,
    pub document_text: String,
    pub record: PayslipRecord,
    pub validation: ValidationOutcome,
    pub coercion_warnings: Vec<NumericCoercionWarning>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Constructed once and shared; cloning is cheap.
#[derive(Clone)]
pub struct PayslipProcessor {
    ocr: Arc<dyn OcrEngine + Send + Sync>,
    reconstructor: Arc<LayoutReconstructor>,
    structurer: Arc<PayslipStructurer>,
    rules: ValidationRules,
    settings: Arc<Settings>,
}

impl PayslipProcessor {
    pub fn new(
        ocr: Arc<dyn OcrEngine + Send + Sync>,
        structurer: PayslipStructurer,
        settings: Settings,
    ) -> Self {
        Self {
            ocr,
            reconstructor: Arc::new(LayoutReconstructor::default()),
            structurer: Arc::new(structurer),
            rules: ValidationRules::default(),
            settings: Arc::new(settings),
        }
    }

    pub fn with_layout_config(mut self, config: LayoutConfig) -> Self {
        self.reconstructor = Arc::new(LayoutReconstructor::new(config));
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Full pipeline from a file on disk, on the calling thread.
    pub fn process_file(&self, source_path: &Path) -> Result<PayslipAnalysis, ProcessingError> {
        let filename = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document");
        let content = std::fs::read(source_path).map_err(ImportError::from)?;
        let format = self.check(filename, &content)?;

        let document_id = Uuid::new_v4();
        let document_text = self.ocr_stage(document_id, format, &content)?;
        let outcome = self.structurer.structure(&document_id, &document_text)?;
        Ok(self.finish(document_id, document_text, outcome))
    }

    /// Full pipeline for uploaded bytes. OCR and the extraction call run on
    /// blocking worker threads so concurrent uploads are not held up.
    pub async fn process_upload(
        &self,
        filename: String,
        content: Vec<u8>,
    ) -> Result<PayslipAnalysis, ProcessingError> {
        let format = self.check(&filename, &content)?;
        let document_id = Uuid::new_v4();
        tracing::info!(doc_id = %document_id, file = %filename, "Processing upload");

        let this = self.clone();
        let document_text = tokio::task::spawn_blocking(move || {
            this.ocr_stage(document_id, format, &content)
        })
        .await??;

        let structurer = Arc::clone(&self.structurer);
        let text = document_text.clone();
        let outcome =
            tokio::task::spawn_blocking(move || structurer.structure(&document_id, &text)).await??;

        Ok(self.finish(document_id, document_text, outcome))
    }

    /// Pipeline from an existing OCR export, skipping upload and OCR.
    pub fn process_ocr_export(
        &self,
        document: &OcrDocument,
    ) -> Result<PayslipAnalysis, ProcessingError> {
        let document_id = Uuid::new_v4();
        let document_text = self.reconstruct_stage(document_id, document);
        let outcome = self.structurer.structure(&document_id, &document_text)?;
        Ok(self.finish(document_id, document_text, outcome))
    }

    /// Upload checks plus what the OCR engine can read, before anything is
    /// written to disk.
    fn check(&self, filename: &str, content: &[u8]) -> Result<UploadFormat, ImportError> {
        let format = check_upload(filename, content, self.settings.max_upload_bytes)?;
        if format == UploadFormat::Pdf && !self.ocr.reads_pdf() {
            return Err(ImportError::UnsupportedFormat(
                "pdf (the OCR engine reads images only; use an OCR export)".to_string(),
            ));
        }
        Ok(format)
    }

    /// Stage the upload, run OCR, and reconstruct the document text. The
    /// staged file is removed when OCR returns, success or failure.
    fn ocr_stage(
        &self,
        document_id: Uuid,
        format: UploadFormat,
        content: &[u8],
    ) -> Result<String, ProcessingError> {
        let document = {
            let staged = stage_upload(
                &self.settings.upload_dir,
                document_id,
                format,
                content,
                self.settings.debug,
            )?;
            let _span = tracing::info_span!("ocr", doc_id = %document_id).entered();
            self.ocr.process(staged.path())?
        };

        tracing::info!(
            doc_id = %document_id,
            pages = document.pages.len(),
            words = document.word_count(),
            "OCR complete"
        );
        Ok(self.reconstruct_stage(document_id, &document))
    }

    fn reconstruct_stage(&self, document_id: Uuid, document: &OcrDocument) -> String {
        let document_text = self.reconstructor.reconstruct(document);
        tracing::debug!(
            doc_id = %document_id,
            prefix = %document_text.chars().take(100).collect::<String>(),
            "Document text reconstructed"
        );

        if let Some(dir) = self.dump_dir(document_id) {
            dump_json(&dir, diagnostic::OCR_EXPORT_FILE, document);
            dump_text(&dir, diagnostic::DOCUMENT_TEXT_FILE, &document_text);
        }
        document_text
    }

    fn finish(
        &self,
        document_id: Uuid,
        document_text: String,
        outcome: StructuringOutcome,
    ) -> PayslipAnalysis {
        let validation = validate(&outcome.record, &self.rules);

        if let Some(dir) = self.dump_dir(document_id) {
            dump_text(&dir, diagnostic::PROMPT_FILE, &outcome.prompt);
            dump_text(&dir, diagnostic::MODEL_RESPONSE_FILE, &outcome.raw_response);
            dump_json(&dir, diagnostic::RECORD_FILE, &outcome.record);
            dump_json(&dir, diagnostic::VALIDATION_FILE, &validation);
        }

        PayslipAnalysis {
            document_id,
            document_text,
            record: outcome.record,
            validation,
            coercion_warnings: outcome.report.coercion_warnings,
        }
    }

    fn dump_dir(&self, document_id: Uuid) -> Option<std::path::PathBuf> {
        let base = self.settings.diagnostic_dir();
        diagnostic::dump_dir_for(base.as_deref(), &document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::{MockOcrEngine, TesseractCli};
    use crate::pipeline::structuring::MockLlmClient;
    use serde_json::json;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];

    fn model_response() -> String {
        json!({
            "metadata": {"periode": "august 2024", "navn": "Mette Jensen"},
            "løn": {
                "samlet_løn_før_skat": "34.957,00",
                "skat": {"skat": 11261.0, "trækprocent": 41, "arbejdsmarkedsbidrag": 2796.0}
            },
            "ferie": {"feriegodtgørelse_fond": 1381.06},
            "arbejdstimer": [{"dato": "2024-08-01", "arbejdstid": "07:00-15:00", "normtid": 7.4}]
        })
        .to_string()
    }

    fn processor(upload_dir: &Path, debug: bool, ocr: MockOcrEngine) -> PayslipProcessor {
        let settings = Settings {
            debug,
            upload_dir: upload_dir.to_path_buf(),
            ..Settings::default()
        };
        let structurer =
            PayslipStructurer::new(Box::new(MockLlmClient::new(&model_response())), "mistral");
        PayslipProcessor::new(Arc::new(ocr), structurer, settings)
    }

    fn payslip_ocr() -> MockOcrEngine {
        MockOcrEngine::from_rows(&["LØNSEDDEL", "Grundløn 24559.41", "Samlet 34957.00"])
    }

    fn upload_dir_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn file_pipeline_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = tmp.path().join("uploads");
        let source = tmp.path().join("lønseddel.png");
        std::fs::write(&source, PNG).unwrap();

        let analysis = processor(&uploads, false, payslip_ocr())
            .process_file(&source)
            .unwrap();

        assert!(analysis.document_text.contains("## LØNSEDDEL ##"));
        assert_eq!(
            analysis.record.get_path(&["bruttolon", "beløb"]),
            Some(&json!(34957.0))
        );
        assert!(analysis.validation.valid);
        let flagged: Vec<_> = analysis.validation.issues.iter().map(|i| i.field_path.as_str()).collect();
        assert_eq!(flagged, vec!["feriepenge"]);
        assert_eq!(upload_dir_entries(&uploads), 0);
    }

    #[test]
    fn staged_upload_removed_when_ocr_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("scan.png");
        std::fs::write(&source, PNG).unwrap();

        let err = processor(tmp.path().join("uploads").as_path(), false, MockOcrEngine::failing("boom"))
            .process_file(&source)
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Extraction(ExtractionError::OcrProcessing(_))));
        assert_eq!(upload_dir_entries(&tmp.path().join("uploads")), 0);
    }

    #[test]
    fn debug_mode_retains_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = tmp.path().join("uploads");
        let source = tmp.path().join("scan.png");
        std::fs::write(&source, PNG).unwrap();

        let mut processor = processor(&uploads, true, payslip_ocr());
        let dump = tmp.path().join("dump");
        processor.settings = Arc::new(Settings {
            dump_dir: Some(dump.clone()),
            ..(*processor.settings).clone()
        });

        let analysis = processor.process_file(&source).unwrap();
        assert_eq!(upload_dir_entries(&uploads), 1);

        let doc_dir = dump.join(analysis.document_id.to_string());
        assert!(doc_dir.join(diagnostic::DOCUMENT_TEXT_FILE).exists());
        assert!(doc_dir.join(diagnostic::MODEL_RESPONSE_FILE).exists());
        assert!(doc_dir.join(diagnostic::VALIDATION_FILE).exists());
    }

    #[test]
    fn rejected_upload_never_reaches_ocr() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = tmp.path().join("uploads");
        let source = tmp.path().join("lønseddel.pdf");
        std::fs::write(&source, PNG).unwrap();

        let err = processor(&uploads, false, MockOcrEngine::failing("not called"))
            .process_file(&source)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Import(ImportError::ContentMismatch { .. })));
        assert!(!uploads.exists());
    }

    #[test]
    fn pdf_rejected_before_staging_for_image_only_engine() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = tmp.path().join("uploads");
        let source = tmp.path().join("lonseddel.pdf");
        std::fs::write(&source, b"%PDF-1.4 side 1").unwrap();

        let settings = Settings {
            upload_dir: uploads.clone(),
            ..Settings::default()
        };
        let structurer =
            PayslipStructurer::new(Box::new(MockLlmClient::new(&model_response())), "mistral");
        let engine = TesseractCli::with_binary(std::path::PathBuf::from("/nonexistent/tesseract"));
        let err = PayslipProcessor::new(Arc::new(engine), structurer, settings)
            .process_file(&source)
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Import(ImportError::UnsupportedFormat(_))));
        assert!(!uploads.exists());
    }

    #[test]
    fn empty_ocr_result_fails_as_too_short() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("blank.png");
        std::fs::write(&source, PNG).unwrap();

        let err = processor(tmp.path(), false, MockOcrEngine::new(OcrDocument::default()))
            .process_file(&source)
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Structuring(StructuringError::InputTooShort(_))
        ));
    }

    #[test]
    fn ocr_export_skips_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let document = MockOcrEngine::from_rows(&["Grundløn 24559.41"])
            .process(Path::new("unused"))
            .unwrap();
        let analysis = processor(tmp.path(), false, MockOcrEngine::failing("not called"))
            .process_ocr_export(&document)
            .unwrap();
        assert!(analysis.document_text.contains("Grundløn"));
        assert_eq!(
            analysis.record.get_path(&["metadata", "periode"]),
            Some(&json!("august 2024"))
        );
    }

    #[tokio::test]
    async fn upload_pipeline_runs_on_workers() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = tmp.path().join("uploads");
        let processor = processor(&uploads, false, payslip_ocr());

        let analysis = processor
            .process_upload("lønseddel.png".into(), PNG.to_vec())
            .await
            .unwrap();

        assert_eq!(analysis.record.get_path(&["am_bidrag", "procent"]), Some(&json!(8.0)));
        assert_eq!(upload_dir_entries(&uploads), 0);

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["validation"]["valid"], json!(true));
        assert!(json["coercion_warnings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_uploads_are_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let processor = processor(tmp.path(), false, payslip_ocr());

        let (a, b) = tokio::join!(
            processor.process_upload("a.png".into(), PNG.to_vec()),
            processor.process_upload("b.png".into(), PNG.to_vec()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.document_id, b.document_id);
        assert_eq!(a.record, b.record);
    }
}
