//! Scrapes the attribute table from a documentation page.
//!
//! One page, one table, one [`AttributeRecord`] per data row. The table is the
//! first `<table>` following the configured anchor element, falling back to
//! the first table on the page.

use crate::config::ExtractorConfig;
use crate::rag::{jsonl, AttributeRecord};
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("No table found on {0}")]
    NotFound(String),

    #[error("Header row {found:?} doesn't match expected {expected:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Failed to write records: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Clone)]
struct TableSelectors {
    table: Selector,
    row: Selector,
    cell: Selector,
}

impl TableSelectors {
    fn new() -> Self {
        Self {
            table: Selector::parse("table").expect("table selector"),
            row: Selector::parse("tr").expect("row selector"),
            cell: Selector::parse("td, th").expect("cell selector"),
        }
    }

    /// First table after the anchor in document order, else the first table.
    fn find_table<'a>(&self, document: &'a Html, anchor: &str) -> Option<ElementRef<'a>> {
        let mut past_anchor = false;
        for node in document.root_element().descendants() {
            let Some(element) = ElementRef::wrap(node) else {
                continue;
            };
            if past_anchor {
                if element.value().name() == "table" {
                    return Some(element);
                }
            } else if element.value().id() == Some(anchor) {
                past_anchor = true;
            }
        }

        if past_anchor {
            debug!(anchor, "No table after anchor; using first table");
        } else {
            debug!(anchor, "Anchor not found; using first table");
        }
        document.select(&self.table).next()
    }

    fn cells(&self, row: ElementRef<'_>) -> Vec<String> {
        row.select(&self.cell).map(cell_text).collect()
    }
}

/// Trimmed text nodes of a cell, empties dropped, joined with one space.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fetches documentation pages and turns their attribute table into records.
pub struct Extractor {
    config: ExtractorConfig,
    http_client: reqwest::Client,
    selectors: TableSelectors,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| ExtractError::Fetch {
                url: config.url.clone(),
                source,
            })?;

        Ok(Self {
            config,
            http_client,
            selectors: TableSelectors::new(),
        })
    }

    /// GETs `url` and returns the body. Non-2xx statuses are errors.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        info!(url, "Fetching page");
        let fetch_err = |source| ExtractError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self.http_client.get(url).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(fetch_err)
    }

    /// Fetches `url` and extracts its attribute table.
    pub async fn extract(&self, url: &str) -> Result<Vec<AttributeRecord>> {
        let html = self.fetch(url).await?;
        self.extract_html(&html, url)
    }

    /// Extracts the attribute table from an already fetched page.
    ///
    /// `url` is only recorded as each record's `source_url`.
    pub fn extract_html(&self, html: &str, url: &str) -> Result<Vec<AttributeRecord>> {
        let document = Html::parse_document(html);
        let table = self
            .selectors
            .find_table(&document, &self.config.anchor)
            .ok_or_else(|| ExtractError::NotFound(url.to_string()))?;

        let rows: Vec<ElementRef<'_>> = table.select(&self.selectors.row).collect();
        let Some((header, data)) = rows.split_first() else {
            warn!(url, "Table has no rows");
            return Ok(Vec::new());
        };
        self.check_headers(*header)?;

        let mut records = Vec::with_capacity(data.len());
        for (offset, row) in data.iter().enumerate() {
            let position = offset + 1;
            let mut cells = self.selectors.cells(*row).into_iter();
            let (Some(attribute), Some(r#type), Some(description)) =
                (cells.next(), cells.next(), cells.next())
            else {
                debug!(position, "Skipping row with fewer than 3 cells");
                continue;
            };

            let mut record = AttributeRecord::new(attribute, r#type, description)
                .with_source(url, &self.config.anchor)
                .with_position(position);
            record.supported_products = cells.next().unwrap_or_default();
            records.push(record);
        }

        info!(records = records.len(), rows = data.len(), "Extracted table");
        Ok(records)
    }

    /// Fetches `url`, extracts it and writes the records as JSON lines.
    ///
    /// Returns the number of records written.
    pub async fn extract_to_file(&self, url: &str, path: &Path) -> Result<usize> {
        let records = self.extract(url).await?;
        save(&records, path)?;
        Ok(records.len())
    }

    fn check_headers(&self, header: ElementRef<'_>) -> Result<()> {
        let found: Vec<String> = self
            .selectors
            .cells(header)
            .into_iter()
            .map(|c| c.to_lowercase())
            .collect();

        let matches = self
            .config
            .expected_headers
            .iter()
            .enumerate()
            .all(|(i, expected)| {
                found
                    .get(i)
                    .is_some_and(|cell| cell.contains(&expected.to_lowercase()))
            });
        if matches {
            return Ok(());
        }

        if self.config.strict_headers {
            return Err(ExtractError::HeaderMismatch {
                expected: self.config.expected_headers.clone(),
                found,
            });
        }
        warn!(
            expected = ?self.config.expected_headers,
            found = ?found,
            "Header row doesn't match; mapping columns by position"
        );
        Ok(())
    }
}

/// Writes records to `path` as JSON lines, replacing the file.
pub fn save(records: &[AttributeRecord], path: &Path) -> Result<()> {
    jsonl::write(path, records)?;
    info!(records = records.len(), path = %path.display(), "Wrote records");
    Ok(())
}
