use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// One row of the scraped documentation table.
///
/// Records are written once by the extractor and never modified; the indexer
/// and retriever both read them back in file order.
///
/// # Example
///
/// ```
/// # use docrag_core::rag::AttributeRecord;
/// let record = AttributeRecord::new("workspace_id", "integer", "Unique ID of the workspace");
/// assert_eq!(
///     record.searchable_text(),
///     "workspace_id | type: integer | Unique ID of the workspace"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub attribute: String,
    #[serde(rename = "type")]
    pub r#type: String,
    pub description: String,
    #[serde(default)]
    pub supported_products: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub anchor: String,
    /// 1-based row offset within the table body
    #[serde(default)]
    pub position: usize,
}

impl AttributeRecord {
    pub fn new(
        attribute: impl Into<String>,
        r#type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            r#type: r#type.into(),
            description: description.into(),
            supported_products: String::new(),
            source_url: String::new(),
            anchor: String::new(),
            position: 0,
        }
    }

    pub fn with_source(mut self, source_url: impl Into<String>, anchor: impl Into<String>) -> Self {
        self.source_url = source_url.into();
        self.anchor = anchor.into();
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// The text embedded for this record.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} | type: {} | {}",
            self.attribute, self.r#type, self.description
        )
    }
}

/// A record returned by a search together with its squared L2 distance.
///
/// Smaller distances are better matches; `0.0` means the query embedding is
/// identical to the record's.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    pub record: AttributeRecord,
    pub distance: f32,
}

/// Written next to the metadata file on every build.
///
/// Ties the persisted vectors to the model that produced them and to the exact
/// metadata file they are aligned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub model: String,
    pub dimension: usize,
    pub count: usize,
    pub metadata_sha256: String,
}

impl IndexManifest {
    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents + "\n")
    }
}
