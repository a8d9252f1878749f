//! Index building from extracted records.
//!
//! One record becomes one vector. The indexer embeds every record first and
//! only then replaces the persisted index, so a failed embedding run leaves
//! the previous index untouched.

use super::embedder::{Embedder, EmbedderError};
use super::jsonl::{self, JsonlError};
use super::store::VectorIndex;
use super::types::{AttributeRecord, IndexManifest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while building an index.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// The records file couldn't be read or parsed.
    #[error(transparent)]
    Records(#[from] JsonlError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    /// Writing vectors to the index failed.
    #[error("Failed to persist index: {0:#}")]
    Store(anyhow::Error),

    /// Writing the metadata or manifest file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for indexing operations.
pub type Result<T> = std::result::Result<T, IndexerError>;

/// What a build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub records: usize,
    pub dimension: usize,
    pub manifest: IndexManifest,
}

/// Builds the vector index and the aligned metadata file.
pub struct Indexer {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    metadata_path: PathBuf,
    manifest_path: PathBuf,
}

impl Indexer {
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        metadata_path: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            index,
            metadata_path: metadata_path.into(),
            manifest_path: manifest_path.into(),
        }
    }

    /// Reads records from a JSON-lines file and indexes them.
    pub async fn build(&self, records_path: &Path) -> Result<IndexSummary> {
        let records: Vec<AttributeRecord> = jsonl::read(records_path)?;
        info!(
            records = records.len(),
            path = %records_path.display(),
            "Loaded records for indexing"
        );
        self.build_from_records(&records).await
    }

    /// Replaces the index with one vector per record, in record order.
    pub async fn build_from_records(&self, records: &[AttributeRecord]) -> Result<IndexSummary> {
        let texts: Vec<String> = records.iter().map(AttributeRecord::searchable_text).collect();
        for (row, text) in texts.iter().enumerate() {
            debug!(row, text = %text, "Searchable text");
        }

        let vectors = self.embedder.embed_batch(&texts).await?;
        let dimension = self.embedder.dimension();

        self.index.reset(dimension).await.map_err(IndexerError::Store)?;
        self.index.add(vectors).await.map_err(IndexerError::Store)?;

        let stored = self.index.count().await.map_err(IndexerError::Store)?;
        if stored != records.len() {
            return Err(IndexerError::Store(anyhow::anyhow!(
                "index holds {} vectors for {} records",
                stored,
                records.len()
            )));
        }

        jsonl::write(&self.metadata_path, records)?;

        let manifest = IndexManifest {
            model: self.embedder.model().id.clone(),
            dimension,
            count: records.len(),
            metadata_sha256: jsonl::sha256_file(&self.metadata_path)?,
        };
        manifest.save(&self.manifest_path)?;

        info!(
            vectors = stored,
            dimension,
            metadata = %self.metadata_path.display(),
            "Saved index and metadata"
        );

        Ok(IndexSummary {
            records: records.len(),
            dimension,
            manifest,
        })
    }
}
