//! Brute-force flat index — exact O(N·D) k-NN search

use rayon::prelude::*;

use crate::distance::squared_euclidean;
use crate::error::{Result, RetrievalError};
use crate::index::Index;
use crate::neighbor_queue::{BoundedMaxHeap, Neighbor};
use crate::vector::FeatureVector;

/// Below this many vectors a query scans on the calling thread.
const PARALLEL_THRESHOLD: usize = 8192;
/// Rows per rayon task.
const CHUNK_ROWS: usize = 1024;

/// A flat index that computes the distance to every stored vector.
///
/// Vectors are kept row-major in one contiguous buffer; row `i` is the
/// vector inserted at position `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrievalError::invalid("index dimension must be at least 1"));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    /// Construct an index over `vectors`, all of which must have `dimension` components.
    pub fn construct(dimension: usize, vectors: &[FeatureVector]) -> Result<Self> {
        let mut index = Self::new(dimension)?;
        index.data.reserve_exact(dimension * vectors.len());
        for v in vectors {
            v.ensure_dimension(dimension)?;
            index.data.extend_from_slice(v.as_slice());
        }
        Ok(index)
    }

    /// Rebuild an index from its row-major buffer.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrievalError::invalid("index dimension must be at least 1"));
        }
        if data.len() % dimension != 0 {
            return Err(RetrievalError::invalid(format!(
                "buffer of {} floats is not a whole number of {}-dimensional rows",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// The row-major buffer backing this index.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Iterate over stored vectors in position order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension)
    }

    fn scan(&self, query: &[f32], top_k: usize, first_position: usize, rows: &[f32]) -> BoundedMaxHeap {
        let mut heap = BoundedMaxHeap::new(top_k);
        for (offset, row) in rows.chunks_exact(self.dimension).enumerate() {
            heap.push(Neighbor::new(first_position + offset, squared_euclidean(query, row)));
        }
        heap
    }

    fn scan_parallel(&self, query: &[f32], top_k: usize) -> BoundedMaxHeap {
        self.data
            .par_chunks(CHUNK_ROWS * self.dimension)
            .enumerate()
            .map(|(chunk, rows)| self.scan(query, top_k, chunk * CHUNK_ROWS, rows))
            .reduce(
                || BoundedMaxHeap::new(top_k),
                |mut acc, heap| {
                    acc.merge(heap);
                    acc
                },
            )
    }
}

impl Index for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn query(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let top_k = top_k.min(self.len());
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let heap = if self.len() >= PARALLEL_THRESHOLD {
            self.scan_parallel(query, top_k)
        } else {
            self.scan(query, top_k, 0, &self.data)
        };
        Ok(heap.into_sorted_vec())
    }
}
