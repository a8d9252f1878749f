//! Gemini provider implementation.
//!
//! Talks to the hosted `generateContent` endpoint. Generation only: the
//! index is embedded with a local sentence model, so `embed` is unsupported.

use super::types::*;
use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hosted Gemini API provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a provider from the LLM config and an already-resolved API key.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(self.api_key.trim())
            .map_err(|_| ProviderError::Other("invalid Gemini API key".to_string()))?;
        headers.insert("x-goog-api-key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(request.prompt),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let parsed = response.json::<GeminiResponse>().await?;

        into_generate_response(request.model, parsed)
    }

    async fn embed(&self, _texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        Err(ProviderError::Unsupported("embedding"))
    }
}

fn into_generate_response(model: String, parsed: GeminiResponse) -> Result<GenerateResponse> {
    let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        ProviderError::Other(format!("Gemini returned no answer: {reason}"))
    })?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    Ok(GenerateResponse {
        model,
        text,
        finish_reason: candidate.finish_reason,
    })
}

// Gemini-specific request/response types (internal)

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case_generation_config() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some("hello".to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1000,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1000);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_response_joins_text_parts() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "workspace_id is "}, {"text": "an integer."}]},
                "finishReason": "STOP"
            }]
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let response = into_generate_response("gemini-1.5-flash".to_string(), parsed).unwrap();
        assert_eq!(response.text, "workspace_id is an integer.");
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let err = into_generate_response("m".to_string(), parsed).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    fn config_for(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generate_against_server() {
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "What is workspace_id?"}]}],
                "generationConfig": {"maxOutputTokens": 1000}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "An integer. [attribute: workspace_id]"}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = GeminiProvider::new(&config_for(mock_server.uri()), "test-key").unwrap();
        let request = GenerateRequest::new("gemini-1.5-flash", "What is workspace_id?")
            .with_temperature(0.1)
            .with_max_output_tokens(1000);
        let response = provider.generate(request).await.unwrap();

        assert_eq!(response.model, "gemini-1.5-flash");
        assert_eq!(response.text, "An integer. [attribute: workspace_id]");
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&mock_server)
            .await;

        let provider = GeminiProvider::new(&config_for(format!("{}/", mock_server.uri())), "bad").unwrap();
        let err = provider
            .generate(GenerateRequest::new("gemini-1.5-flash", "hi"))
            .await
            .unwrap_err();

        match err {
            ProviderError::Api { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "API key not valid");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_is_unsupported() {
        let provider = GeminiProvider::new(&LlmConfig::default(), "key").unwrap();
        let err = provider.embed(&["x".to_string()], "m").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }
}
