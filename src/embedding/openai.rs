//! OpenAI-compatible embeddings client.

use super::{Embedder, DIMENSION_PROBE};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Embedder speaking the OpenAI `/embeddings` wire format.
///
/// Works against api.openai.com and any compatible server (Ollama,
/// LM Studio, vLLM, Azure-style gateways). API keys are stored using
/// `SecretString`, which zeroizes memory on drop.
pub struct OpenAiEmbedder {
    /// Embeddings base endpoint, without the `/embeddings` suffix.
    endpoint: String,
    /// Model name.
    model: String,
    /// API key (zeroized on drop).
    api_key: Option<SecretString>,
    /// HTTP client; its configured timeouts bound every call.
    client: reqwest::blocking::Client,
    /// Native dimension, written once by the first probe.
    vector_size: OnceLock<usize>,
}

impl OpenAiEmbedder {
    /// Creates a new embedder for the given endpoint and model.
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
            vector_size: OnceLock::new(),
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

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(
                "Authorization",
                format!("Bearer {}", key.expose_secret()),
            );
        }

        let response = request.send().map_err(|e| Error::BackendUnavailable {
            backend: "embedder".to_string(),
            cause: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            tracing::error!(status, body = %body, "embedding request rejected");
            return Err(Error::Protocol {
                backend: "embedder".to_string(),
                status,
                body,
            });
        }

        let parsed: EmbeddingResponse =
            response.json().map_err(|e| Error::Protocol {
                backend: "embedder".to_string(),
                status: 0,
                body: format!("malformed embeddings response: {e}"),
            })?;

        if parsed.data.len() != inputs.len() {
            return Err(Error::Protocol {
                backend: "embedder".to_string(),
                status: 0,
                body: format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    parsed.data.len()
                ),
            });
        }

        // The API may return rows out of order; index is authoritative.
        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }
}

impl Embedder for OpenAiEmbedder {
    fn vector_size(&self) -> Result<usize> {
        if let Some(size) = self.vector_size.get() {
            return Ok(*size);
        }
        let probe = self.embed(DIMENSION_PROBE)?;
        let size = probe.len();
        if size == 0 {
            return Err(Error::Protocol {
                backend: "embedder".to_string(),
                status: 0,
                body: "probe embedding has zero length".to_string(),
            });
        }
        tracing::debug!(model = %self.model, dimensions = size, "detected embedding dimension");
        Ok(*self.vector_size.get_or_init(|| size))
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::Validation(
                "cannot embed empty text".to_string(),
            ));
        }
        let mut vectors = self.request(&[text])?;
        Ok(vectors.remove(0))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::Validation(
                "cannot embed empty text".to_string(),
            ));
        }
        self.request(texts)
    }
}

/// Request body for the embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

/// Response body from the embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

/// One embedding row.
#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let embedder = OpenAiEmbedder::new("http://localhost:11434/v1/", "nomic-embed-text");
        assert_eq!(embedder.endpoint, "http://localhost:11434/v1");
    }

    #[test]
    fn test_empty_text_rejected() {
        let embedder = OpenAiEmbedder::new("http://localhost", "m");
        assert!(matches!(embedder.embed("  "), Err(Error::Validation(_))));
        assert!(matches!(
            embedder.embed_batch(&["ok", ""]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let embedder = OpenAiEmbedder::new("http://localhost", "m");
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_response_rows_sorted_by_index() {
        let raw = r#"{"data":[
            {"index":1,"embedding":[0.2]},
            {"index":0,"embedding":[0.1]}
        ]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        parsed.data.sort_by_key(|row| row.index);
        assert!((parsed.data[0].embedding[0] - 0.1).abs() < f32::EPSILON);
    }
}
