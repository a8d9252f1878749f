//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.
//! It is the default embedding backend and can also answer questions locally.

use super::types::*;
use async_trait::async_trait;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider talking to `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new("http://localhost:11434")
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/api/generate", self.base_url);

        let mut options = HashMap::new();
        options.insert("temperature".to_string(), serde_json::json!(request.temperature));
        options.insert("num_predict".to_string(), serde_json::json!(request.max_output_tokens));

        let ollama_request = OllamaGenerateRequest {
            model: request.model.clone(),
            prompt: request.prompt,
            stream: false,
            options: Some(options),
        };

        let response = self.http_client.post(&url).json(&ollama_request).send().await?;
        let response = ensure_success(response).await?;
        let parsed = response.json::<OllamaGenerateResponse>().await?;

        Ok(GenerateResponse {
            model: parsed.model,
            text: parsed.response,
            finish_reason: parsed.done_reason,
        })
    }

    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: model.to_string(),
            input: texts.to_vec(),
        };

        let response = self.http_client.post(&url).json(&embed_request).send().await?;
        let response = ensure_success(response).await?;
        let embed_response = response.json::<EmbedResponse>().await?;

        if embed_response.embeddings.is_empty() {
            return Err(ProviderError::Other("No embeddings returned".to_string()));
        }
        Ok(embed_response.embeddings)
    }
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaGenerateResponse {
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    done_reason: Option<String>,
}
