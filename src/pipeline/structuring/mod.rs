pub mod types;
pub mod prompt;
pub mod literal;
pub mod sanitize;
pub mod normalize;
pub mod ollama;
pub mod mistral;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use sanitize::*;
pub use normalize::*;
pub use ollama::*;
pub use mistral::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("LLM service is not reachable at {0}")]
    LlmConnection(String),

    #[error("LLM service returned error (status {status}): {body}")]
    LlmError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("No extraction model available")]
    NoModelAvailable,

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Input text too short for extraction (< {0} characters)")]
    InputTooShort(usize),

    #[error(transparent)]
    Parsing(#[from] ParsingError),
}

/// Model output that could not be turned into a record by either the strict
/// or the relaxed parser. Carries both failures and the cleaned text.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Could not parse model output as JSON: {strict_error}; relaxed parse: {relaxed_error}")]
pub struct ParsingError {
    pub cleaned: String,
    pub strict_error: String,
    pub relaxed_error: String,
}
