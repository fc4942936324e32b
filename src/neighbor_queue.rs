//! Bounded priority queue for top-k selection — handles f32 ordering for BinaryHeap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate result: a position in the index and its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

impl Neighbor {
    pub fn new(position: usize, distance: f32) -> Self {
        Self { position, distance }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Total order: distance first, then insertion position. Two scans over
// disjoint ranges therefore merge into exactly the sequential ranking.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// Max-heap that keeps only the `limit` smallest neighbors seen so far.
#[derive(Debug)]
pub struct BoundedMaxHeap {
    heap: BinaryHeap<Neighbor>,
    limit: usize,
}

impl BoundedMaxHeap {
    pub fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit.saturating_add(1).min(4096)),
            limit,
        }
    }

    /// Offer a candidate; it is kept only if it ranks among the best `limit`.
    pub fn push(&mut self, n: Neighbor) {
        if self.heap.len() < self.limit {
            self.heap.push(n);
            return;
        }
        if let Some(worst) = self.heap.peek() {
            if n < *worst {
                self.heap.pop();
                self.heap.push(n);
            }
        }
    }

    /// The worst neighbor currently kept.
    pub fn peek(&self) -> Option<&Neighbor> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Fold another heap's candidates into this one.
    pub fn merge(&mut self, other: BoundedMaxHeap) {
        for n in other.heap {
            self.push(n);
        }
    }

    /// Drain into a Vec sorted ascending by (distance, position).
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }
}
