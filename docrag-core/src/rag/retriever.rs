//! Query-time nearest-neighbor lookup over a built index.

use super::embedder::Embedder;
use super::jsonl;
use super::store::VectorIndex;
use super::types::{AttributeRecord, IndexManifest, RetrievalHit};
use super::{RagError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only view of an index and its aligned metadata.
///
/// Opening checks that the index, the metadata file and the manifest all
/// describe the same build; any disagreement is reported as
/// [`RagError::NotLoaded`] instead of producing misattributed hits.
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    metadata: Vec<AttributeRecord>,
}

impl Retriever {
    pub async fn open(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        metadata_path: &Path,
        manifest_path: &Path,
    ) -> Result<Self> {
        let manifest = IndexManifest::load(manifest_path).map_err(|e| {
            RagError::NotLoaded(format!(
                "manifest {} unreadable: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let metadata: Vec<AttributeRecord> = jsonl::read(metadata_path)
            .map_err(|e| RagError::NotLoaded(e.to_string()))?;

        let checksum = jsonl::sha256_file(metadata_path)
            .map_err(|e| RagError::NotLoaded(e.to_string()))?;
        if checksum != manifest.metadata_sha256 {
            return Err(RagError::NotLoaded(format!(
                "{} changed since the index was built",
                metadata_path.display()
            )));
        }

        let model = embedder.model();
        if manifest.model != model.id || manifest.dimension != model.embedding_dim {
            return Err(RagError::NotLoaded(format!(
                "index was built with {} ({} dims) but {} ({} dims) is configured",
                manifest.model, manifest.dimension, model.id, model.embedding_dim
            )));
        }

        if manifest.count != metadata.len() {
            return Err(RagError::NotLoaded(format!(
                "manifest records {} entries, metadata has {}",
                manifest.count,
                metadata.len()
            )));
        }

        let retriever = Self::from_parts(embedder, index, metadata).await?;
        info!(
            records = retriever.len(),
            model = %manifest.model,
            "Index loaded"
        );
        Ok(retriever)
    }

    /// Wraps an already built index and its metadata.
    ///
    /// Fails with [`RagError::NotLoaded`] when the index is missing or holds
    /// a different number of vectors than there are records.
    pub async fn from_parts(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        metadata: Vec<AttributeRecord>,
    ) -> Result<Self> {
        let count = index
            .count()
            .await
            .map_err(|e| RagError::NotLoaded(format!("{:#}", e)))?;
        if count != metadata.len() {
            return Err(RagError::NotLoaded(format!(
                "index holds {} vectors but metadata has {} records",
                count,
                metadata.len()
            )));
        }

        Ok(Self {
            embedder,
            index,
            metadata,
        })
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Returns at most `k` hits, closest first.
    ///
    /// Equal distances are ordered by the record's table position.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        if k == 0 || self.metadata.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        let neighbors = self
            .index
            .search(&embedding, k)
            .await
            .map_err(|e| RagError::Retrieval(format!("{:#}", e)))?;

        let mut hits: Vec<RetrievalHit> = neighbors
            .into_iter()
            .filter_map(|n| {
                let row = usize::try_from(n.row).ok()?;
                let record = self.metadata.get(row)?;
                Some(RetrievalHit {
                    record: record.clone(),
                    distance: n.distance,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.record.position.cmp(&b.record.position))
        });
        hits.truncate(k);

        for hit in &hits {
            debug!(attribute = %hit.record.attribute, distance = hit.distance, "Hit");
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmbeddingModel;
    use crate::rag::indexer::Indexer;
    use crate::rag::store::FlatIndex;
    use crate::testing::HashingProvider;
    use std::fs;
    use std::path::PathBuf;

    const DIM: usize = 64;

    fn embedder(model: &str) -> Embedder {
        Embedder::new(
            Arc::new(HashingProvider::new(DIM)),
            EmbeddingModel::custom(model, DIM),
        )
    }

    fn records() -> Vec<AttributeRecord> {
        vec![
            AttributeRecord::new("workspace_id", "integer", "Unique ID of the workspace").with_position(1),
            AttributeRecord::new("subject", "string", "Subject of the ticket").with_position(2),
            AttributeRecord::new("priority", "number", "Priority of the ticket").with_position(3),
            AttributeRecord::new("status", "number", "Status of the ticket").with_position(4),
        ]
    }

    struct Built {
        _dir: tempfile::TempDir,
        index: Arc<FlatIndex>,
        metadata: PathBuf,
        manifest: PathBuf,
    }

    async fn build() -> Built {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(FlatIndex::new());
        let metadata = dir.path().join("meta.jsonl");
        let manifest = dir.path().join("manifest.json");
        Indexer::new(embedder("hashing"), index.clone(), &metadata, &manifest)
            .build_from_records(&records())
            .await
            .unwrap();
        Built {
            _dir: dir,
            index,
            metadata,
            manifest,
        }
    }

    async fn open(built: &Built, model: &str) -> Result<Retriever> {
        Retriever::open(embedder(model), built.index.clone(), &built.metadata, &built.manifest).await
    }

    #[tokio::test]
    async fn test_search_finds_exact_record() {
        let built = build().await;
        let retriever = open(&built, "hashing").await.unwrap();
        assert_eq!(retriever.len(), 4);

        let hits = retriever
            .search(&records()[0].searchable_text(), 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.attribute, "workspace_id");
        assert!(hits[0].distance.abs() < 1e-6);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_search_cardinality() {
        let built = build().await;
        let retriever = open(&built, "hashing").await.unwrap();

        assert!(retriever.search("ticket", 0).await.unwrap().is_empty());
        assert_eq!(retriever.search("ticket", 3).await.unwrap().len(), 3);
        // Sentinel rows beyond the index size never surface as hits.
        assert_eq!(retriever.search("ticket", 10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_ties_ordered_by_position() {
        let index = Arc::new(FlatIndex::new());
        index.reset(DIM).await.unwrap();
        let mut unit = vec![0.0; DIM];
        unit[0] = 1.0;
        index.add(vec![unit; 4]).await.unwrap();

        let metadata: Vec<AttributeRecord> = records()
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.with_position(4 - i))
            .collect();
        let retriever = Retriever::from_parts(embedder("hashing"), index, metadata).await.unwrap();

        // An empty query embeds to the zero vector: every distance is 1.0.
        let hits = retriever.search("", 4).await.unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.record.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(hits[0].record.attribute, "status");
    }

    #[tokio::test]
    async fn test_missing_manifest_is_not_loaded() {
        let built = build().await;
        fs::remove_file(&built.manifest).unwrap();
        assert!(matches!(open(&built, "hashing").await, Err(RagError::NotLoaded(_))));
    }

    #[tokio::test]
    async fn test_model_mismatch_is_not_loaded() {
        let built = build().await;
        assert!(matches!(open(&built, "other").await, Err(RagError::NotLoaded(_))));
    }

    #[tokio::test]
    async fn test_edited_metadata_is_not_loaded() {
        let built = build().await;
        let mut metadata: Vec<AttributeRecord> = jsonl::read(&built.metadata).unwrap();
        metadata.pop();
        jsonl::write(&built.metadata, &metadata).unwrap();

        assert!(matches!(open(&built, "hashing").await, Err(RagError::NotLoaded(_))));
    }

    #[tokio::test]
    async fn test_misaligned_parts_are_not_loaded() {
        let index = Arc::new(FlatIndex::new());
        index.reset(DIM).await.unwrap();
        index.add(vec![vec![0.0; DIM]]).await.unwrap();

        let result = Retriever::from_parts(embedder("hashing"), index, records()).await;
        assert!(matches!(result, Err(RagError::NotLoaded(_))));
    }

    #[tokio::test]
    async fn test_unbuilt_index_is_not_loaded() {
        let result = Retriever::from_parts(embedder("hashing"), Arc::new(FlatIndex::new()), Vec::new()).await;
        assert!(matches!(result, Err(RagError::NotLoaded(_))));
    }
}
