use serde::Serialize;

use super::StructuringError;

/// Language-model backend abstraction (allows mocking).
///
/// Calls block; async callers run them on a worker thread.
pub trait LlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError>;

    fn is_model_available(&self, model: &str) -> Result<bool, StructuringError>;

    fn list_models(&self) -> Result<Vec<String>, StructuringError>;
}

/// A financial string that could not be read as a number. The value is
/// left untouched in the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericCoercionWarning {
    /// Dotted path of the offending value, list positions in brackets.
    pub path: String,
    pub value: String,
}

impl std::fmt::Display for NumericCoercionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not convert {}={:?} to a number", self.path, self.value)
    }
}
