//! Retrieval Augmented Generation (RAG) pipeline over a single attribute table.
//!
//! # Overview
//!
//! Every scraped [`AttributeRecord`] becomes exactly one vector. There is no
//! chunking: a record's [`searchable_text`](AttributeRecord::searchable_text)
//! is embedded as-is.
//!
//! - [`embedder`]: converts text to vector embeddings via a [`Provider`]
//! - [`store`]: the [`VectorIndex`] trait and the in-memory [`FlatIndex`]
//! - `lancedb_store`: the persistent [`LanceDbIndex`]
//! - [`indexer`]: builds the index, the aligned metadata file and the manifest
//! - [`retriever`]: validates a built index and answers nearest-neighbor queries
//!
//! # How It Works
//!
//! 1. **Indexing Phase**:
//!    - Records are read from the extractor's JSON-lines output
//!    - Each record is embedded in batches
//!    - The index is replaced wholesale; row `i` is record `i`
//!
//! 2. **Retrieval Phase**:
//!    - The query is embedded with the same model
//!    - The index returns the `k` nearest rows by squared L2 distance
//!    - Rows are mapped back to records through the metadata file
//!
//! Generation is handled by [`crate::chat`].

pub mod embedder;
pub mod indexer;
pub mod jsonl;
mod lancedb_store;
pub mod retriever;
pub mod store;
mod types;

pub use embedder::{Embedder, EmbedderError};
pub use indexer::{IndexSummary, Indexer, IndexerError};
pub use lancedb_store::LanceDbIndex;
pub use retriever::Retriever;
pub use store::{FlatIndex, Neighbor, VectorIndex, NO_MATCH};
pub use types::{AttributeRecord, IndexManifest, RetrievalHit};

use crate::chat::{Answerer, ChatSession};
use crate::config::{Config, ConfigError};
use crate::provider::{create_generator, OllamaProvider, Provider, ProviderError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to open vector index: {0:#}")]
    Index(anyhow::Error),

    /// The persisted index is missing or doesn't match its metadata.
    #[error("Index not loaded: {0}; run `docrag index` first")]
    NotLoaded(String),

    #[error("Failed to retrieve context: {0}")]
    Retrieval(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Owns the embedder and the index handle for one configuration.
///
/// Built once at startup and passed to whatever needs it; dropping it
/// releases the index connection. The answering provider is created by
/// [`open_session`](Self::open_session), only when a session is needed.
///
/// # Example
///
/// ```no_run
/// # use docrag_core::{Config, rag::RagEngine};
/// # async fn example() -> docrag_core::rag::Result<()> {
/// let config = Config::load_or_default();
/// let engine = RagEngine::new(&config).await?;
/// let retriever = engine.open_retriever().await?;
/// for hit in retriever.search("What is workspace_id?", 5).await? {
///     println!("{} ({:.3})", hit.record.attribute, hit.distance);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RagEngine {
    config: Config,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
}

impl RagEngine {
    /// Connects to Ollama for embeddings and to the LanceDB index on disk.
    pub async fn new(config: &Config) -> Result<Self> {
        let provider = Arc::new(OllamaProvider::new(&config.embedding.base_url));
        let index = LanceDbIndex::connect(&config.storage.index_path, &config.storage.table_name)
            .await
            .map_err(RagError::Index)?;
        Self::with_parts(config, provider, Arc::new(index))
    }

    /// Builds an engine from an explicit embedding provider and index.
    pub fn with_parts(
        config: &Config,
        provider: Arc<dyn Provider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let model = config.embedding.resolve_model()?;
        let embedder = Embedder::new(provider, model).with_batch_size(config.embedding.batch_size);
        Ok(Self {
            config: config.clone(),
            embedder,
            index,
        })
    }

    /// Rebuilds the index from a records file.
    pub async fn build_index(&self, records_path: &Path) -> Result<IndexSummary> {
        let indexer = Indexer::new(
            self.embedder.clone(),
            self.index.clone(),
            &self.config.storage.metadata_path,
            &self.config.storage.manifest_path,
        );
        Ok(indexer.build(records_path).await?)
    }

    /// Opens the built index for querying.
    pub async fn open_retriever(&self) -> Result<Retriever> {
        Retriever::open(
            self.embedder.clone(),
            self.index.clone(),
            &self.config.storage.metadata_path,
            &self.config.storage.manifest_path,
        )
        .await
    }

    /// Number of vectors currently stored. Fails if nothing was built.
    pub async fn count(&self) -> Result<usize> {
        self.index.count().await.map_err(RagError::Index)
    }

    /// Starts a question session.
    ///
    /// The API key is checked before anything else, then the answering
    /// provider is created and the index opened.
    pub async fn open_session(&self) -> Result<ChatSession> {
        let api_key = self.config.llm.api_key()?;
        let generator = create_generator(&self.config.llm, api_key)?;
        self.open_session_with(generator).await
    }

    /// Starts a question session answered by `generator`.
    pub async fn open_session_with(&self, generator: Arc<dyn Provider>) -> Result<ChatSession> {
        let retriever = self.open_retriever().await?;
        let answerer = Answerer::new(generator, &self.config.llm, self.config.confidence);
        Ok(ChatSession::new(
            retriever,
            answerer,
            self.config.storage.top_k,
        ))
    }
}
