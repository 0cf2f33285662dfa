//! OpenAI-compatible chat completions client.

use super::LlmProvider;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Maximum completion tokens for any memory operation. Extraction over a
/// long transcript is the largest answer; merges and rankings are tiny.
const MAX_COMPLETION_TOKENS: u32 = 2048;

/// LLM client speaking the OpenAI `/chat/completions` wire format.
///
/// Works against api.openai.com and any compatible server. API keys are
/// stored using `SecretString`, which zeroizes memory on drop. Completions
/// run at temperature 0 so extraction and merging stay reproducible.
pub struct OpenAiClient {
    /// Chat base endpoint, without the `/chat/completions` suffix.
    endpoint: String,
    /// Model name.
    model: String,
    /// API key (zeroized on drop).
    api_key: Option<SecretString>,
    /// HTTP client; its configured timeouts bound every call.
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Creates a new client for the given endpoint and model.
    ///
    /// Trailing slashes on the endpoint are trimmed so request paths are
    /// always composed the same way.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Replaces the HTTP client, e.g. to impose timeouts.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, messages: Vec<ChatMessage>) -> Result<String> {
        tracing::debug!(model = %self.model, "issuing chat completion");

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature: 0.0,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(
                "Authorization",
                format!("Bearer {}", key.expose_secret()),
            );
        }

        let response = request.send().map_err(|e| {
            tracing::error!(model = %self.model, error = %e, "chat completion failed");
            Error::BackendUnavailable {
                backend: "llm".to_string(),
                cause: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            tracing::error!(model = %self.model, status, body = %body, "chat completion rejected");
            return Err(Error::Protocol {
                backend: "llm".to_string(),
                status,
                body,
            });
        }

        let parsed: ChatCompletionResponse =
            response.json().map_err(|e| Error::Protocol {
                backend: "llm".to_string(),
                status: 0,
                body: format!("malformed completion response: {e}"),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Protocol {
                backend: "llm".to_string(),
                status: 0,
                body: "no choices in completion response".to_string(),
            })
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }])
    }
}

/// Request to the chat completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// A message in the chat.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the chat completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// A choice in the response.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
