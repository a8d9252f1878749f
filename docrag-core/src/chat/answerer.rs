//! Grounded answer generation from retrieved records.

use crate::config::LlmConfig;
use crate::provider::{GenerateRequest, Provider, ProviderError};
use crate::rag::RetrievalHit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Returned verbatim when the documents don't cover the question.
pub const REFUSAL: &str = "I don't know — please check the source.";

pub const SYSTEM_PROMPT: &str = "SYSTEM:
You are an assistant that answers only using the provided documentation excerpts.
Always cite the exact attribute name(s) used in your answer in square brackets like [attribute: workspace_id].
If the documentation does not contain an answer, respond: \"I don't know — please check the source.\"";

const INSTRUCTIONS: &str = "INSTRUCTIONS:
- Use only the DOCUMENTS to answer.
- If you generate example code (curl/JSON), include only fields present in the docs and mark optional fields.
- Provide a confidence label (High/Medium/Low) based on how directly the docs cover the question.
- After the answer, list the sources used with their attribute names and source_url.";

/// Coarse retrieval-coverage label. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        };
        f.write_str(label)
    }
}

/// Maps average squared L2 distance to a [`Confidence`].
///
/// Lower distance is never labeled less confident than higher distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    pub high_below: f32,
    pub medium_below: f32,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            high_below: 0.3,
            medium_below: 1.0,
        }
    }
}

impl ConfidencePolicy {
    pub fn label(&self, average_distance: f32) -> Confidence {
        if average_distance < self.high_below {
            Confidence::High
        } else if average_distance < self.medium_below {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Labels a hit list by its mean distance; no hits is `Low`.
    pub fn for_hits(&self, hits: &[RetrievalHit]) -> Confidence {
        if hits.is_empty() {
            return Confidence::Low;
        }
        let total: f32 = hits.iter().map(|h| h.distance).sum();
        self.label(total / hits.len() as f32)
    }
}

/// A record cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub attribute: String,
    #[serde(rename = "type")]
    pub r#type: String,
    pub source_url: String,
    pub position: usize,
    /// Squared L2 distance of the hit
    pub score: f32,
}

impl From<&RetrievalHit> for Source {
    fn from(hit: &RetrievalHit) -> Self {
        Self {
            attribute: hit.record.attribute.clone(),
            r#type: hit.record.r#type.clone(),
            source_url: hit.record.source_url.clone(),
            position: hit.record.position,
            score: hit.distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
    pub confidence: Confidence,
}

impl Answer {
    pub fn refusal() -> Self {
        Self {
            text: REFUSAL.to_string(),
            sources: Vec::new(),
            confidence: Confidence::Low,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

/// Builds the constrained prompt and calls the generation model once.
#[derive(Clone)]
pub struct Answerer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_output_tokens: usize,
    policy: ConfidencePolicy,
}

impl Answerer {
    pub fn new(provider: Arc<dyn Provider>, llm: &LlmConfig, policy: ConfidencePolicy) -> Self {
        Self {
            provider,
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_output_tokens: llm.max_output_tokens,
            policy,
        }
    }

    /// Renders the full prompt for `query` over `hits`, numbered from 1.
    pub fn build_prompt(query: &str, hits: &[RetrievalHit]) -> String {
        let mut documents = String::new();
        for (i, hit) in hits.iter().enumerate() {
            let record = &hit.record;
            documents.push_str(&format!(
                "{}) attribute: {}\n   type: {}\n   description: {}\n\n",
                i + 1,
                record.attribute,
                record.r#type,
                record.description
            ));
        }

        format!(
            "{}\n\nDOCUMENTS:\n{}\nUSER QUESTION:\n{}\n\n{}\n",
            SYSTEM_PROMPT, documents, query, INSTRUCTIONS
        )
    }

    /// Answers `query` from `hits`.
    ///
    /// With no hits the model is not called and the refusal is returned.
    pub async fn answer(&self, query: &str, hits: &[RetrievalHit]) -> Result<Answer, GenerationError> {
        if hits.is_empty() {
            debug!("No hits; returning refusal");
            return Ok(Answer::refusal());
        }

        let prompt = Self::build_prompt(query, hits);
        let request = GenerateRequest::new(&self.model, prompt)
            .with_temperature(self.temperature)
            .with_max_output_tokens(self.max_output_tokens);

        let response = self.provider.generate(request).await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        let confidence = self.policy.for_hits(hits);
        info!(
            model = %response.model,
            hits = hits.len(),
            confidence = %confidence,
            "Generated answer"
        );

        Ok(Answer {
            text: text.to_string(),
            sources: hits.iter().map(Source::from).collect(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::AttributeRecord;
    use crate::testing::CitingGenerator;

    fn hit(attribute: &str, distance: f32) -> RetrievalHit {
        RetrievalHit {
            record: AttributeRecord::new(attribute, "integer", format!("The {} field", attribute))
                .with_source("https://docs.example.com", "ticket_attributes")
                .with_position(1),
            distance,
        }
    }

    fn answerer(provider: Arc<CitingGenerator>) -> Answerer {
        Answerer::new(provider, &LlmConfig::default(), ConfidencePolicy::default())
    }

    #[test]
    fn test_confidence_boundaries() {
        let policy = ConfidencePolicy::default();
        assert_eq!(policy.label(0.0), Confidence::High);
        assert_eq!(policy.label(0.29), Confidence::High);
        assert_eq!(policy.label(0.3), Confidence::Medium);
        assert_eq!(policy.label(0.99), Confidence::Medium);
        assert_eq!(policy.label(1.0), Confidence::Low);
        assert_eq!(policy.label(f32::MAX), Confidence::Low);
    }

    #[test]
    fn test_confidence_is_monotonic() {
        let policy = ConfidencePolicy::default();
        let mut previous = Confidence::High;
        for step in 0..300 {
            let label = policy.label(step as f32 * 0.01);
            assert!(label <= previous);
            previous = label;
        }
    }

    #[test]
    fn test_confidence_uses_mean_distance() {
        let policy = ConfidencePolicy::default();
        assert_eq!(policy.for_hits(&[hit("a", 0.1), hit("b", 0.3)]), Confidence::High);
        assert_eq!(policy.for_hits(&[hit("a", 0.1), hit("b", 1.5)]), Confidence::Medium);
        assert_eq!(policy.for_hits(&[]), Confidence::Low);
    }

    #[test]
    fn test_prompt_lists_documents_in_order() {
        let prompt = Answerer::build_prompt("What is workspace_id?", &[hit("workspace_id", 0.1), hit("subject", 0.5)]);

        assert!(prompt.starts_with("SYSTEM:"));
        assert!(prompt.contains("[attribute: workspace_id]"));
        assert!(prompt.contains(REFUSAL));
        let first = prompt.find("1) attribute: workspace_id").unwrap();
        let second = prompt.find("2) attribute: subject").unwrap();
        assert!(first < second);
        assert!(prompt.contains("   description: The subject field"));
        assert!(prompt.contains("USER QUESTION:\nWhat is workspace_id?"));
    }

    #[tokio::test]
    async fn test_no_hits_skips_model() {
        let provider = Arc::new(CitingGenerator::default());
        let answer = answerer(provider.clone()).answer("anything", &[]).await.unwrap();

        assert_eq!(answer, Answer::refusal());
        assert_eq!(answer.text, "I don't know — please check the source.");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_carries_sources_and_confidence() {
        let provider = Arc::new(CitingGenerator::default());
        let hits = [hit("workspace_id", 0.1), hit("subject", 0.2)];
        let answer = answerer(provider.clone()).answer("What is workspace_id?", &hits).await.unwrap();

        assert!(answer.text.contains("[attribute: workspace_id]"));
        assert_eq!(answer.confidence, Confidence::High);
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].attribute, "workspace_id");
        assert_eq!(answer.sources[0].score, 0.1);
        assert_eq!(provider.calls(), 1);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "gemini-1.5-flash");
        assert_eq!(requests[0].temperature, 0.1);
        assert_eq!(requests[0].max_output_tokens, 1000);
        assert!(requests[0].prompt.contains("USER QUESTION:\nWhat is workspace_id?"));
    }

    #[tokio::test]
    async fn test_sampling_follows_llm_config() {
        let provider = Arc::new(CitingGenerator::default());
        let llm = LlmConfig {
            temperature: 0.4,
            max_output_tokens: 256,
            ..LlmConfig::default()
        };
        Answerer::new(provider.clone(), &llm, ConfidencePolicy::default())
            .answer("q", &[hit("a", 0.1)])
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, 0.4);
        assert_eq!(requests[0].max_output_tokens, 256);
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_response() {
        let provider = Arc::new(CitingGenerator::replying("  \n\t "));
        let err = answerer(provider.clone()).answer("q", &[hit("a", 0.1)]).await.unwrap_err();

        assert!(matches!(err, GenerationError::EmptyResponse));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_reply_is_trimmed() {
        let provider = Arc::new(CitingGenerator::replying("\n  workspace_id is an integer. [attribute: a]\n"));
        let answer = answerer(provider).answer("q", &[hit("a", 0.1)]).await.unwrap();
        assert_eq!(answer.text, "workspace_id is an integer. [attribute: a]");
    }

    #[tokio::test]
    async fn test_provider_failure_is_typed() {
        let provider = Arc::new(CitingGenerator::failing());
        let err = answerer(provider).answer("q", &[hit("a", 0.1)]).await.unwrap_err();
        assert!(matches!(err, GenerationError::Provider(ProviderError::Api { status: 503, .. })));
    }
}
