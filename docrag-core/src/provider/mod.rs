//! Model provider abstraction layer.
//!
//! This module defines a common interface for the model backends
//! (Gemini, Ollama) that provide completions and embeddings.

mod types;
pub mod gemini;
pub mod ollama;

use crate::config::{LlmConfig, LlmProviderKind};
use std::sync::Arc;

// Re-export common types
pub use types::{
    EmbedRequest, EmbedResponse, GenerateRequest, GenerateResponse, Provider, ProviderError,
    Result,
};

// Re-export provider implementations
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

/// Builds the answering provider selected in the config.
///
/// `api_key` comes from [`LlmConfig::api_key`] and must be present for Gemini.
pub fn create_generator(config: &LlmConfig, api_key: Option<String>) -> Result<Arc<dyn Provider>> {
    match config.provider {
        LlmProviderKind::Gemini => {
            let key = api_key.ok_or_else(|| {
                ProviderError::Other(format!("{} is required for Gemini", config.api_key_env))
            })?;
            Ok(Arc::new(GeminiProvider::new(config, key)?))
        }
        LlmProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(&config.base_url))),
    }
}
