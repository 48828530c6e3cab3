use uuid::Uuid;

use super::normalize::{normalize_record, NormalizationReport};
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::sanitize::sanitize_and_parse;
use super::types::LlmClient;
use super::{MistralClient, OllamaClient, StructuringError};
use crate::config::Settings;
use crate::pipeline::record::{paths, FieldPath, PayslipRecord};

/// Minimum input length for extraction (characters).
const MIN_INPUT_LENGTH: usize = 10;

/// Everything one extraction call produced.
#[derive(Debug, Clone)]
pub struct StructuringOutcome {
    pub record: PayslipRecord,
    pub report: NormalizationReport,
    pub prompt: String,
    pub raw_response: String,
}

/// Orchestrates payslip extraction:
/// prompt → LLM → sanitize/parse → normalize
pub struct PayslipStructurer {
    llm: Box<dyn LlmClient + Send + Sync>,
    model_name: String,
}

impl PayslipStructurer {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, model_name: &str) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
        }
    }

    /// Pick the backend from settings: Mistral when an API key is set,
    /// otherwise the local Ollama instance.
    pub fn from_settings(settings: &Settings) -> Result<Self, StructuringError> {
        if let Some(key) = &settings.mistral_api_key {
            let client = MistralClient::new(key, settings.llm_timeout_secs)?;
            tracing::info!(model = %settings.mistral_model, "Using Mistral extraction backend");
            return Ok(Self::new(Box::new(client), &settings.mistral_model));
        }

        let client = OllamaClient::new(&settings.ollama_url, settings.llm_timeout_secs)?;
        let model = match &settings.ollama_model {
            Some(model) => model.clone(),
            None => client.find_best_model()?,
        };
        tracing::info!(model = %model, url = %settings.ollama_url, "Using Ollama extraction backend");
        Ok(Self::new(Box::new(client), &model))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Extract a normalized record from reconstructed document text.
    ///
    /// Network and parse failures are fatal; there is no retry.
    pub fn structure(
        &self,
        document_id: &Uuid,
        document_text: &str,
    ) -> Result<StructuringOutcome, StructuringError> {
        let _span = tracing::info_span!("structure_payslip", doc_id = %document_id).entered();

        if document_text.trim().chars().count() < MIN_INPUT_LENGTH {
            return Err(StructuringError::InputTooShort(MIN_INPUT_LENGTH));
        }

        tracing::debug!(
            chars = document_text.chars().count(),
            prefix = %prefix(document_text, 100),
            "Document text ready for extraction"
        );

        let prompt = build_extraction_prompt(document_text);

        tracing::info!(model = %self.model_name, "Sending extraction request");
        let raw_response = self
            .llm
            .generate(&self.model_name, &prompt, EXTRACTION_SYSTEM_PROMPT)
            .inspect_err(|e| tracing::error!(error = %e, "Extraction request failed"))?;
        tracing::info!("Received extraction response");
        tracing::debug!(prefix = %prefix(&raw_response, 200), "Raw extraction response");

        let mut record = sanitize_and_parse(&raw_response)?;
        let report = normalize_record(&mut record);

        log_key_fields(&record);

        Ok(StructuringOutcome {
            record,
            report,
            prompt,
            raw_response,
        })
    }
}

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

fn display_field(record: &PayslipRecord, field_paths: &[FieldPath]) -> String {
    match record.first_present(field_paths) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "ikke fundet".to_string(),
    }
}

fn log_key_fields(record: &PayslipRecord) {
    let gross = record
        .first_number(paths::GROSS_PAY)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "ikke fundet".to_string());
    let net = record
        .first_number(paths::NET_PAY)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "ikke fundet".to_string());

    tracing::info!(
        periode = %display_field(record, paths::PERIOD),
        navn = %display_field(record, paths::EMPLOYEE_NAME),
        arbejdsplads = %display_field(record, paths::WORKPLACE),
        gross_pay = %gross,
        net_pay = %net,
        work_days = record.list("arbejdstimer").len(),
        "Extracted payslip"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::ollama::MockLlmClient;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const DOCUMENT: &str = "[SEKTION:LØN]\nGrundløn 24559.41\nSamlet løn før skat 34957.00";

    /// Counts calls and always returns the same response.
    struct CountingLlmClient {
        calls: Arc<AtomicUsize>,
        response: String,
    }

    impl LlmClient for CountingLlmClient {
        fn generate(
            &self,
            _model: &str,
            prompt: &str,
            system: &str,
        ) -> Result<String, StructuringError> {
            assert!(prompt.contains("Grundløn 24559.41"));
            assert_eq!(system, EXTRACTION_SYSTEM_PROMPT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        fn is_model_available(&self, _model: &str) -> Result<bool, StructuringError> {
            Ok(true)
        }

        fn list_models(&self) -> Result<Vec<String>, StructuringError> {
            Ok(vec![])
        }
    }

    fn structurer(response: &str) -> PayslipStructurer {
        PayslipStructurer::new(Box::new(MockLlmClient::new(response)), "mistral")
    }

    #[test]
    fn fenced_response_is_parsed_and_normalized() {
        let response = "```json\n{\"metadata\": {\"periode\": \"august 2024\", \"navn\": \"Jensen\"},\n \"løn\": {\"samlet_løn_før_skat\": \"34.957,00\", \"skat\": {\"skat\": 11261, \"trækprocent\": 41, \"arbejdsmarkedsbidrag\": 2796}},\n \"arbejdstimer\": [],}\n```";
        let outcome = structurer(response)
            .structure(&Uuid::new_v4(), DOCUMENT)
            .unwrap();

        assert_eq!(
            outcome.record.get_path(&["løn", "samlet_løn_før_skat"]),
            Some(&json!(34957.0))
        );
        assert_eq!(
            outcome.record.get_path(&["bruttolon", "beløb"]),
            Some(&json!(34957.0))
        );
        assert_eq!(outcome.record.get_path(&["a_skat", "beløb"]), Some(&json!(11261)));
        assert_eq!(outcome.record.get_path(&["am_bidrag", "procent"]), Some(&json!(8.0)));
        assert!(outcome.report.coercion_warnings.is_empty());
        assert_eq!(outcome.raw_response, response);
        assert!(outcome.prompt.contains(DOCUMENT));
    }

    #[test]
    fn short_input_is_rejected_before_llm_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let structurer = PayslipStructurer::new(
            Box::new(CountingLlmClient {
                calls: calls.clone(),
                response: "{}".into(),
            }),
            "mistral",
        );
        let result = structurer.structure(&Uuid::new_v4(), "  løn  ");
        assert!(matches!(result, Err(StructuringError::InputTooShort(10))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unparseable_response_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let structurer = PayslipStructurer::new(
            Box::new(CountingLlmClient {
                calls: calls.clone(),
                response: "Jeg kan ikke hjælpe med det.".into(),
            }),
            "mistral",
        );
        let err = structurer.structure(&Uuid::new_v4(), DOCUMENT).unwrap_err();
        match err {
            StructuringError::Parsing(parsing) => {
                assert_eq!(parsing.cleaned, "Jeg kan ikke hjælpe med det.");
                assert!(!parsing.strict_error.is_empty());
                assert!(!parsing.relaxed_error.is_empty());
            }
            other => panic!("expected parsing error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connection_failure_surfaces_as_is() {
        let structurer = PayslipStructurer::new(
            Box::new(MockLlmClient::unreachable("http://localhost:11434")),
            "mistral",
        );
        let err = structurer.structure(&Uuid::new_v4(), DOCUMENT).unwrap_err();
        assert!(matches!(err, StructuringError::LlmConnection(_)));
    }

    #[test]
    fn coercion_warnings_are_reported() {
        let response = r#"{"metadata": {}, "løn": {"fradrag": [{"type": "ATP", "beløb": "se bagside"}]}}"#;
        let outcome = structurer(response)
            .structure(&Uuid::new_v4(), DOCUMENT)
            .unwrap();
        assert_eq!(outcome.report.coercion_warnings.len(), 1);
        assert_eq!(outcome.report.coercion_warnings[0].path, "løn.fradrag[0].beløb");
    }

    #[test]
    fn mistral_key_selects_mistral_backend() {
        let settings = Settings {
            mistral_api_key: Some("key".into()),
            ..Settings::default()
        };
        let structurer = PayslipStructurer::from_settings(&settings).unwrap();
        assert_eq!(structurer.model_name(), "mistral-medium");
    }

    #[test]
    fn explicit_ollama_model_skips_discovery() {
        let settings = Settings {
            ollama_model: Some("llama3.1:8b".into()),
            ..Settings::default()
        };
        let structurer = PayslipStructurer::from_settings(&settings).unwrap();
        assert_eq!(structurer.model_name(), "llama3.1:8b");
    }
}
