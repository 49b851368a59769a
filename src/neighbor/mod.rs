/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Score-sorted neighbor lists.

use crate::{HnswResult, NodeId};

// Exports
mod array;
pub use array::{NeighborArray, OrderViolation};

mod concurrent;
pub use concurrent::ConcurrentNeighborArray;

//////////////
// Neighbor //
//////////////

/// A neighbor entry: a node id and its similarity score to the owning
/// node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// The id of the neighboring node.
    pub id: NodeId,

    /// The similarity between the owning node and this neighbor. Larger
    /// is more similar.
    pub score: f32,
}

impl Neighbor {
    /// Create a new neighbor entry.
    pub fn new(id: NodeId, score: f32) -> Self {
        Self { id, score }
    }

    /// Return the contents of `self` as a tuple.
    pub fn as_tuple(self) -> (NodeId, f32) {
        (self.id, self.score)
    }
}

///////////
// Merge //
///////////

/// Merge two descending-score arrays into their set-union, in descending
/// order, deduplicating equal (id, score) pairs.
///
/// Tie policy: when scores are equal, the entry from `a1` is emitted
/// first, and an `a2` entry carrying the same id as the just-emitted
/// entry is dropped. While draining whichever side remains after the
/// other is exhausted, entries whose id equals the other side's most
/// recently consumed id are dropped as well — without this, an edge
/// present in both inputs at the boundary would be emitted twice.
pub fn merge_candidates(a1: &NeighborArray, a2: &NeighborArray) -> HnswResult<NeighborArray> {
    debug_assert!(a1.scores_descending());
    debug_assert!(a2.scores_descending());

    let (n1, s1) = (a1.nodes(), a1.scores());
    let (n2, s2) = (a2.nodes(), a2.scores());

    let mut merged = NeighborArray::new(a1.len() + a2.len(), true);
    let (mut i, mut j) = (0, 0);

    while i < n1.len() && j < n2.len() {
        if s1[i] > s2[j] {
            merged.add_in_order(n1[i], s1[i])?;
            i += 1;
        } else if s1[i] < s2[j] {
            merged.add_in_order(n2[j], s2[j])?;
            j += 1;
        } else {
            merged.add_in_order(n1[i], s1[i])?;
            if n2[j] != n1[i] {
                merged.add_in_order(n2[j], s2[j])?;
            }
            i += 1;
            j += 1;
        }
    }

    // Drain the remainder of `a1`, skipping ids equal to the last entry
    // consumed from `a2`.
    while i < n1.len() {
        if j > 0 && n1[i] == n2[j - 1] {
            i += 1;
            continue;
        }
        merged.add_in_order(n1[i], s1[i])?;
        i += 1;
    }

    // And symmetrically for `a2`.
    while j < n2.len() {
        if i > 0 && n2[j] == n1[i - 1] {
            j += 1;
            continue;
        }
        merged.add_in_order(n2[j], s2[j])?;
        j += 1;
    }

    Ok(merged)
}

///////////
// Tests //
///////////
