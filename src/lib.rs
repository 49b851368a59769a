/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Concurrent per-node neighbor sets for HNSW graph construction.
//!
//! An HNSW index stores, for every node, a bounded list of that node's
//! nearest neighbors under a user-supplied similarity function. During
//! index build many threads insert edges at once (two nodes may pick each
//! other simultaneously), and the lists must stay *diverse* — pruned by
//! the alpha-relaxed relative-neighborhood rule that makes the graph
//! navigable rather than merely nearest-neighbor-correct.
//!
//! [`ConcurrentNeighborSet`] is that structure. Each set publishes an
//! immutable [`ConcurrentNeighborArray`] snapshot behind an atomic
//! reference; mutators copy, modify, and compare-and-swap, so readers
//! never pay synchronization cost on the hottest path of graph search.

pub mod error;
pub mod graph;
pub mod neighbor;
pub mod similarity;

// Top level exports.
pub use error::{ErrorContext, HnswError, HnswErrorKind, HnswResult};
pub use graph::ConcurrentNeighborSet;
pub use neighbor::{merge_candidates, ConcurrentNeighborArray, Neighbor, NeighborArray};
pub use similarity::{NeighborSimilarity, ScoreFunction};

/// The data type used to identify graph nodes.
///
/// Neighbor lists store ids densely, so a 32-bit id keeps the per-node
/// memory footprint small and lets a pair of ids pack into a single
/// 64-bit cache key.
pub type NodeId = u32;

#[cfg(test)]
mod test_util;
