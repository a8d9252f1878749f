//! In-test provider fakes.

use crate::provider::{GenerateRequest, GenerateResponse, Provider, ProviderError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Bag-of-words embedder: each lowercase token is hashed into a bucket and
/// the vector is L2-normalized. Identical texts embed identically.
pub struct HashingProvider {
    dim: usize,
}

impl HashingProvider {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % self.dim as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Provider for HashingProvider {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
        Err(ProviderError::Unsupported("generation"))
    }

    async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Answers by citing the first document in the prompt, or fails on demand.
///
/// Every request is recorded as received.
#[derive(Default)]
pub struct CitingGenerator {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<GenerateRequest>>,
    pub fail: bool,
    /// Fixed reply text instead of a citation
    pub reply: Option<String>,
}

impl CitingGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for CitingGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(ProviderError::Api {
                status: 503,
                body: "model overloaded".to_string(),
            });
        }

        if let Some(reply) = &self.reply {
            return Ok(GenerateResponse {
                model: request.model,
                text: reply.clone(),
                finish_reason: Some("STOP".to_string()),
            });
        }

        let cited = request
            .prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix("1) attribute: "))
            .unwrap_or("none");
        Ok(GenerateResponse {
            model: request.model,
            text: format!("It is documented here. [attribute: {}]", cited),
            finish_reason: Some("STOP".to_string()),
        })
    }

    async fn embed(&self, _texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        Err(ProviderError::Unsupported("embeddings"))
    }
}
