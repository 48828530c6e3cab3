use serde::{Deserialize, Serialize};

use super::types::LlmClient;
use super::StructuringError;

pub const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1";

/// Mistral chat-completions client (hosted inference).
pub struct MistralClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl MistralClient {
    /// Fails with `MissingApiKey` when `api_key` is blank.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, StructuringError> {
        Self::with_base_url(MISTRAL_API_URL, api_key, timeout_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(StructuringError::MissingApiKey("Mistral"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> StructuringError {
        if e.is_connect() {
            StructuringError::LlmConnection(self.base_url.clone())
        } else if e.is_timeout() {
            StructuringError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            StructuringError::HttpClient(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Build the message list; an empty system prompt is left out.
fn chat_messages<'a>(prompt: &'a str, system: &'a str) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt,
    });
    messages
}

/// Text of the first choice, trimmed.
fn first_choice_text(response: ChatResponse) -> Result<String, StructuringError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| StructuringError::ResponseParsing("response has no choices".into()))?;

    tracing::debug!(
        model = response.model.as_deref().unwrap_or("unknown"),
        finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
        "Mistral completion received"
    );

    Ok(choice.message.content.unwrap_or_default().trim().to_string())
}

impl LlmClient for MistralClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: chat_messages(prompt, system),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::LlmError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        first_choice_text(parsed)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, StructuringError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    fn list_models(&self) -> Result<Vec<String>, StructuringError> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::LlmError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ModelList = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            MistralClient::new("  ", 30),
            Err(StructuringError::MissingApiKey("Mistral"))
        ));
    }

    #[test]
    fn constructor_trims_url_and_key() {
        let client = MistralClient::with_base_url("http://localhost:8080/v1/", " abc ", 30).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.api_key, "abc");
    }

    #[test]
    fn request_serializes_system_and_user_messages() {
        let body = ChatRequest {
            model: "mistral-medium",
            messages: chat_messages("Lønseddel", "Svar med JSON"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "mistral-medium",
                "messages": [
                    {"role": "system", "content": "Svar med JSON"},
                    {"role": "user", "content": "Lønseddel"}
                ]
            })
        );
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let messages = chat_messages("tekst", "");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn first_choice_content_is_trimmed() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"model": "mistral-medium", "choices": [{"message": {"content": "  {\"a\": 1}\n"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn no_choices_is_a_parsing_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            first_choice_text(response),
            Err(StructuringError::ResponseParsing(_))
        ));
    }
}
