//! Vector index abstraction and the in-memory flat index.
//!
//! Indexes store one vector per row, rows numbered `0..count` in insertion
//! order. Row `i` always corresponds to metadata entry `i`; nothing in an
//! index reorders rows.

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use std::sync::RwLock;

/// Row id returned in place of a real row when fewer than `k` vectors exist.
pub const NO_MATCH: i64 = -1;

/// One search result: a row id and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: i64,
    pub distance: f32,
}

/// Unified interface for exact (exhaustive) L2 vector indexes.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Drops every stored vector and prepares an empty index of `dimension`.
    async fn reset(&self, dimension: usize) -> Result<()>;

    /// Appends vectors; they receive row ids `count..count + vectors.len()`.
    async fn add(&self, vectors: Vec<Vec<f32>>) -> Result<()>;

    /// Returns the `k` nearest rows by squared Euclidean distance, closest first.
    ///
    /// Implementations may pad the result with [`NO_MATCH`] rows when the
    /// index holds fewer than `k` vectors; callers must skip them.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Returns the number of stored vectors.
    ///
    /// Fails if the index has never been built.
    async fn count(&self) -> Result<usize>;
}

/// Squared Euclidean distance.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// An in-memory flat L2 index.
///
/// Search is a linear scan over every vector. Results are padded with
/// [`NO_MATCH`] up to `k`, the way exhaustive-search libraries report
/// missing neighbors.
#[derive(Default)]
pub struct FlatIndex {
    state: RwLock<Option<FlatState>>,
}

struct FlatState {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn reset(&self, dimension: usize) -> Result<()> {
        let mut state = self.state.write().map_err(|_| anyhow!("flat index lock poisoned"))?;
        *state = Some(FlatState {
            dimension,
            vectors: Vec::new(),
        });
        Ok(())
    }

    async fn add(&self, vectors: Vec<Vec<f32>>) -> Result<()> {
        let mut guard = self.state.write().map_err(|_| anyhow!("flat index lock poisoned"))?;
        let state = guard.as_mut().ok_or_else(|| anyhow!("flat index not initialized"))?;
        for vector in &vectors {
            ensure!(
                vector.len() == state.dimension,
                "vector has {} dimensions, index expects {}",
                vector.len(),
                state.dimension
            );
        }
        state.vectors.extend(vectors);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let guard = self.state.read().map_err(|_| anyhow!("flat index lock poisoned"))?;
        let state = guard.as_ref().ok_or_else(|| anyhow!("flat index not initialized"))?;
        ensure!(
            query.len() == state.dimension,
            "query has {} dimensions, index expects {}",
            query.len(),
            state.dimension
        );

        let mut results: Vec<Neighbor> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row: row as i64,
                distance: squared_l2(query, vector),
            })
            .collect();

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        results.truncate(k);
        while results.len() < k {
            results.push(Neighbor {
                row: NO_MATCH,
                distance: f32::MAX,
            });
        }

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self.state.read().map_err(|_| anyhow!("flat index lock poisoned"))?;
        guard
            .as_ref()
            .map(|state| state.vectors.len())
            .ok_or_else(|| anyhow!("flat index not initialized"))
    }
}
