use serde::{Deserialize, Serialize};

/// A sentence-embedding model served by the embedding provider.
///
/// The `id` is the name the provider knows the model by and is recorded in the
/// index manifest, so an index can only be queried with the model that built it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub id: String,
    pub name: String,
    pub hf_repo: Option<String>,
    pub embedding_dim: usize,
    pub description: String,
}

impl EmbeddingModel {
    /// Describes a model the registry does not know, given its dimension.
    pub fn custom(id: impl Into<String>, embedding_dim: usize) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            hf_repo: None,
            embedding_dim,
            description: "User-provided embedding model".to_string(),
        }
    }
}

impl Default for EmbeddingModel {
    fn default() -> Self {
        EmbeddingModel {
            id: "all-minilm".to_string(),
            name: "all-MiniLM-L6-v2".to_string(),
            hf_repo: Some("sentence-transformers/all-MiniLM-L6-v2".to_string()),
            embedding_dim: 384,
            description: "Small, fast English sentence embedding model".to_string(),
        }
    }
}

pub struct ModelRegistry {
    models: Vec<EmbeddingModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: default_models(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&EmbeddingModel> {
        let id = id.strip_suffix(":latest").unwrap_or(id);
        self.models.iter().find(|m| m.id == id)
    }

    pub fn embedding_models(&self) -> impl Iterator<Item = &EmbeddingModel> {
        self.models.iter()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_models() -> Vec<EmbeddingModel> {
    vec![
        EmbeddingModel::default(),
        EmbeddingModel {
            id: "nomic-embed-text".to_string(),
            name: "Nomic Embed Text v1.5".to_string(),
            hf_repo: Some("nomic-ai/nomic-embed-text-v1.5".to_string()),
            embedding_dim: 768,
            description: "General purpose long-context embedding model".to_string(),
        },
        EmbeddingModel {
            id: "mxbai-embed-large".to_string(),
            name: "mxbai-embed-large-v1".to_string(),
            hf_repo: Some("mixedbread-ai/mxbai-embed-large-v1".to_string()),
            embedding_dim: 1024,
            description: "Higher quality English embedding model".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_models() {
        let registry = ModelRegistry::new();
        assert!(!registry.models.is_empty());
    }

    #[test]
    fn test_default_is_minilm() {
        let registry = ModelRegistry::new();
        let model = registry.get("all-minilm").unwrap();
        assert_eq!(model.embedding_dim, 384);
        assert_eq!(model, &EmbeddingModel::default());
    }

    #[test]
    fn test_get_ignores_latest_tag() {
        let registry = ModelRegistry::new();
        let model = registry.get("nomic-embed-text:latest").unwrap();
        assert_eq!(model.embedding_dim, 768);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::new();
        assert!(registry.get("not-a-model").is_none());
    }

    #[test]
    fn test_model_ids_unique() {
        let registry = ModelRegistry::new();
        let ids: Vec<_> = registry.embedding_models().map(|m| m.id.as_str()).collect();
        let mut unique_ids = ids.clone();
        unique_ids.sort();
        unique_ids.dedup();
        assert_eq!(ids.len(), unique_ids.len(), "Model IDs must be unique");
    }
}
