//! docrag-core - Retrieval-augmented QA over a scraped documentation table
//!
//! Provides the pipeline stages and the pieces they share:
//! - Extraction of one HTML attribute table into JSON-lines records
//! - Model provider abstraction (Gemini, Ollama)
//! - Indexing and exact nearest-neighbor retrieval (LanceDB or in-memory)
//! - Grounded answer generation and an interactive session
//! - Configuration management
//!
//! ## Primary API
//!
//! Build a [`RagEngine`] from a [`Config`], open a [`rag::Retriever`] from
//! it, and hand that to a [`ChatSession`] together with an [`Answerer`].

// Public modules
pub mod chat;
pub mod config;
pub mod extractor;
pub mod models;
pub mod provider;
pub mod rag;

#[cfg(test)]
mod testing;

// Public exports
pub use chat::{Answer, Answerer, ChatSession, ChatTurn, Confidence, ConfidencePolicy};
pub use config::{Config, ConfigError};
pub use extractor::{ExtractError, Extractor};
pub use rag::{AttributeRecord, RagEngine, RagError, RetrievalHit};

// Provider exports
pub use provider::{create_generator, GenerateRequest, GenerateResponse, Provider, ProviderError};
