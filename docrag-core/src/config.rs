use crate::chat::ConfidencePolicy;
use crate::models::{EmbeddingModel, ModelRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0} is not set; export it or add it to .env")]
    MissingApiKey(String),

    #[error("Unknown embedding model '{0}'; set embedding.dimension to use it")]
    UnknownEmbeddingModel(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole pipeline: scraping, indexing, retrieval and answering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub confidence: ConfidencePolicy,
}

/// Which backend generates answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Hosted Gemini API (needs an API key)
    Gemini,
    /// Local Ollama server
    Ollama,
}

/// Configuration for the answering model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: usize,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds; unset means wait indefinitely
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// Reads the API key for the configured provider from the environment.
    ///
    /// Returns `Ok(None)` for providers that need no key.
    pub fn api_key(&self) -> Result<Option<String>> {
        match self.provider {
            LlmProviderKind::Ollama => Ok(None),
            LlmProviderKind::Gemini => match std::env::var(&self.api_key_env) {
                Ok(key) if !key.trim().is_empty() => Ok(Some(key.trim().to_string())),
                _ => Err(ConfigError::MissingApiKey(self.api_key_env.clone())),
            },
        }
    }
}

/// Configuration for the sentence-embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// Vector dimension; only needed for models the registry doesn't know
    pub dimension: Option<usize>,
    pub batch_size: usize,
}

impl EmbeddingConfig {
    /// Resolves the configured model name to a full descriptor.
    pub fn resolve_model(&self) -> Result<EmbeddingModel> {
        let registry = ModelRegistry::new();
        match (registry.get(&self.model), self.dimension) {
            (Some(known), None) => Ok(known.clone()),
            (Some(known), Some(dim)) if dim == known.embedding_dim => Ok(known.clone()),
            (Some(known), Some(dim)) => Err(ConfigError::Invalid(format!(
                "embedding model '{}' produces {} dimensions, not {}",
                self.model, known.embedding_dim, dim
            ))),
            (None, Some(dim)) => Ok(EmbeddingModel::custom(&self.model, dim)),
            (None, None) => Err(ConfigError::UnknownEmbeddingModel(self.model.clone())),
        }
    }
}

fn default_batch_size() -> usize {
    32
}

/// Configuration for scraping the attribute table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub url: String,
    /// Element id the target table follows
    pub anchor: String,
    pub user_agent: String,
    /// Header cells expected (lower-case, in column order)
    pub expected_headers: Vec<String>,
    /// Fail instead of warning when the header row doesn't match
    pub strict_headers: bool,
    pub output: PathBuf,
}

fn default_expected_headers() -> Vec<String> {
    vec![
        "attribute".to_string(),
        "type".to_string(),
        "description".to_string(),
    ]
}

/// Storage configuration for the index and its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// LanceDB directory
    pub index_path: PathBuf,
    pub table_name: String,
    /// Records in vector order, one JSON object per line
    pub metadata_path: PathBuf,
    pub manifest_path: PathBuf,
    /// Number of results to return from vector similarity searches
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Gemini,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.1,
            max_output_tokens: 1000,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: EmbeddingModel::default().id,
            dimension: None,
            batch_size: default_batch_size(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            url: "https://api.freshservice.com/#ticket_attributes".to_string(),
            anchor: "ticket_attributes".to_string(),
            user_agent: "fresh-scraper/1.0".to_string(),
            expected_headers: default_expected_headers(),
            strict_headers: false,
            output: PathBuf::from("data/attributes.jsonl"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/index"),
            table_name: "attributes".to_string(),
            metadata_path: PathBuf::from("data/meta.jsonl"),
            manifest_path: PathBuf::from("data/manifest.json"),
            top_k: default_top_k(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Checks values serde can't: positive sizes and ordered thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.storage.top_k == 0 {
            return Err(ConfigError::Invalid("storage.top_k must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid("embedding.batch_size must be at least 1".into()));
        }
        if self.llm.max_output_tokens == 0 {
            return Err(ConfigError::Invalid("llm.max_output_tokens must be at least 1".into()));
        }
        if self.confidence.high_below > self.confidence.medium_below {
            return Err(ConfigError::Invalid(format!(
                "confidence.high_below ({}) must not exceed confidence.medium_below ({})",
                self.confidence.high_below, self.confidence.medium_below
            )));
        }
        self.embedding.resolve_model()?;
        Ok(())
    }
}
