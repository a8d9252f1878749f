//! LanceDB vector index implementation.
//!
//! This module provides the persistent, in-process index. The table holds a
//! `row` column (the metadata position) and a fixed-size `vector` column.
//! No ANN index is ever created on the table, so every query is an exact scan.

use super::store::{Neighbor, VectorIndex};
use anyhow::{Context, Result};
use arrow_array::{
    array::{ArrayRef, FixedSizeListArray, Float32Array, Int64Array},
    Array, RecordBatch, RecordBatchIterator,
};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use lancedb::arrow::arrow_schema::{DataType, Field, Schema};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// LanceDB-backed flat L2 index stored under a local directory.
pub struct LanceDbIndex {
    conn: Connection,
    table_name: String,
}

impl LanceDbIndex {
    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("row", DataType::Int64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
        ]))
    }

    /// Connects to the LanceDB directory at `path`.
    ///
    /// The table itself is not opened until it is used, so connecting to an
    /// index that hasn't been built yet succeeds.
    pub async fn connect(path: &Path, table_name: impl Into<String>) -> Result<Self> {
        let uri = path.to_string_lossy().to_string();
        let conn = connect(&uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            conn,
            table_name: table_name.into(),
        })
    }

    async fn exists(&self) -> Result<bool> {
        let table_names = self.conn.table_names().execute().await?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn table(&self) -> Result<Table> {
        self.conn
            .open_table(&self.table_name)
            .execute()
            .await
            .with_context(|| format!("Failed to open LanceDB table '{}'", self.table_name))
    }
}

#[async_trait]
impl VectorIndex for LanceDbIndex {
    async fn reset(&self, dimension: usize) -> Result<()> {
        if self.exists().await? {
            self.conn
                .drop_table(&self.table_name, &[])
                .await
                .context("Failed to drop table")?;
        }

        let schema = Self::create_schema(dimension);
        self.conn
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .context("Failed to create LanceDB table")?;

        Ok(())
    }

    async fn add(&self, vectors: Vec<Vec<f32>>) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }

        let table = self.table().await?;
        let start = table.count_rows(None).await? as i64;
        let dimension = vectors[0].len();
        anyhow::ensure!(
            vectors.iter().all(|v| v.len() == dimension),
            "all vectors in a batch must have the same dimension"
        );

        let schema = Self::create_schema(dimension);
        let rows = Int64Array::from_iter_values(start..start + vectors.len() as i64);
        let values = Float32Array::from(vectors.into_iter().flatten().collect::<Vec<f32>>());
        let vector_array = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimension as i32,
            Arc::new(values),
            None,
        );

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(rows) as ArrayRef,
                Arc::new(vector_array) as ArrayRef,
            ],
        )
        .context("Failed to create record batch")?;

        let schema_ref = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema_ref);

        table
            .add(reader)
            .execute()
            .await
            .context("Failed to add vectors to LanceDB")?;

        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let table = self.table().await?;
        let results = table
            .query()
            .limit(k)
            .nearest_to(query)?
            .distance_type(DistanceType::L2)
            .bypass_vector_index()
            .execute()
            .await
            .context("Failed to execute LanceDB query")?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut neighbors = Vec::new();

        for batch in batches {
            let row_col = batch.column_by_name("row").context("Missing 'row' column")?;
            let distance_col = batch
                .column_by_name("_distance")
                .context("Missing '_distance' column")?;

            let row_array = row_col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("Failed to cast 'row' to Int64Array")?;
            let distance_array = distance_col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("Failed to cast '_distance' to Float32Array")?;

            for i in 0..batch.num_rows() {
                if row_array.is_null(i) {
                    continue;
                }
                neighbors.push(Neighbor {
                    row: row_array.value(i),
                    distance: distance_array.value(i),
                });
            }
        }

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        debug!(requested = k, returned = neighbors.len(), "LanceDB search complete");
        Ok(neighbors)
    }

    async fn count(&self) -> Result<usize> {
        let table = self.table().await?;
        let count = table.count_rows(None).await?;
        Ok(count)
    }
}
