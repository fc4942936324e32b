//! Index trait for swappable nearest-neighbor backends

use crate::error::Result;
use crate::neighbor_queue::Neighbor;

/// A read-only nearest-neighbor index over fixed-dimension vectors.
///
/// Indexes know nothing about identifiers: results are positions in
/// insertion order, which the caller resolves through its identifier array.
pub trait Index: Send + Sync {
    /// Dimension every stored and query vector must have.
    fn dimension(&self) -> usize;

    /// The number of vectors in this index.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the `top_k` nearest vectors to `query`.
    ///
    /// Returns at most `min(top_k, len())` neighbors sorted by distance
    /// ascending, ties by lowest position. Fails with `DimensionMismatch`
    /// when `query.len() != dimension()`.
    fn query(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>>;
}
