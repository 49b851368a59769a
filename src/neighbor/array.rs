/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use thiserror::Error;

use crate::neighbor::Neighbor;
use crate::NodeId;

/// A bounded, score-sorted list of neighbors.
///
/// Ids and scores are stored in two parallel dense vectors instead of a
/// single vector of pairs: iterating a node's neighbors is the hot loop
/// of both graph search and graph construction, and the split layout
/// keeps id scans sequential with no padding.
///
/// The `descending` flag fixes the total order for the lifetime of the
/// array: scores are non-increasing when set (best first, the order
/// neighbor sets use) and non-decreasing otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborArray {
    node: Vec<NodeId>,
    score: Vec<f32>,
    descending: bool,
}

impl NeighborArray {
    /// Construct an empty array with room for `capacity` entries.
    pub fn new(capacity: usize, descending: bool) -> Self {
        Self {
            node: Vec::with_capacity(capacity),
            score: Vec::with_capacity(capacity),
            descending,
        }
    }

    /// The number of live entries.
    pub fn len(&self) -> usize {
        self.node.len()
    }

    /// Return `true` if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// The length of the backing storage.
    pub fn capacity(&self) -> usize {
        self.node.capacity()
    }

    /// The live node ids, sorted by score.
    pub fn nodes(&self) -> &[NodeId] {
        &self.node
    }

    /// The live scores, in the configured order.
    pub fn scores(&self) -> &[f32] {
        &self.score
    }

    /// Return `true` if scores are ordered best-first.
    pub fn scores_descending(&self) -> bool {
        self.descending
    }

    /// Iterate over the live entries as [`Neighbor`] values.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Neighbor> + '_ {
        std::iter::zip(self.node.iter(), self.score.iter())
            .map(|(&id, &score)| Neighbor::new(id, score))
    }

    /// Append an entry, requiring that it respects the configured order
    /// with respect to the current last entry.
    pub fn add_in_order(&mut self, node: NodeId, score: f32) -> Result<(), OrderViolation> {
        if let Some(&last) = self.score.last() {
            let in_order = if self.descending {
                last >= score
            } else {
                last <= score
            };
            if !in_order {
                return Err(OrderViolation {
                    last,
                    score,
                    descending: self.descending,
                });
            }
        }

        if self.node.len() == self.node.capacity() {
            self.grow();
        }
        self.node.push(node);
        self.score.push(score);
        Ok(())
    }

    /// Insert an entry at its sorted position, shifting the tail.
    ///
    /// Ties are stable with respect to insertion: among equal scores a
    /// new entry lands to the right of the existing run under descending
    /// order and to the left under ascending order.
    pub fn insert_sorted(&mut self, node: NodeId, score: f32) {
        let at = self.insertion_point(score);
        self.insert_at(at, node, score);
    }

    /// Remove the entry at `index`, shifting the suffix left.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove_index(&mut self, index: usize) {
        self.node.remove(index);
        self.score.remove(index);
    }

    /// The rightmost position at which `score` can be inserted without
    /// breaking the configured order.
    pub(crate) fn insertion_point(&self, score: f32) -> usize {
        if self.descending {
            self.score.partition_point(|&s| s >= score)
        } else {
            self.score.partition_point(|&s| s < score)
        }
    }

    /// Place an entry at a previously computed insertion point.
    pub(crate) fn insert_at(&mut self, index: usize, node: NodeId, score: f32) {
        if self.node.len() == self.node.capacity() {
            self.grow();
        }
        self.node.insert(index, node);
        self.score.insert(index, score);
    }

    /// Deep copy of the live prefix, preserving capacity and order.
    pub fn copy(&self) -> Self {
        let mut copy = Self::new(self.capacity(), self.descending);
        copy.node.extend_from_slice(&self.node);
        copy.score.extend_from_slice(&self.score);
        copy
    }

    /// Grow the backing storage to `max(capacity + 1, ceil(capacity * 1.5))`.
    fn grow(&mut self) {
        let capacity = self.node.capacity();
        let target = (capacity + 1).max(capacity + capacity.div_ceil(2));
        let additional = target - self.node.len();
        self.node.reserve_exact(additional);
        self.score.reserve_exact(additional);
    }
}

impl Default for NeighborArray {
    /// An empty, descending-ordered array.
    fn default() -> Self {
        Self::new(0, true)
    }
}

/// An [`NeighborArray::add_in_order`] call would have broken the
/// configured score order.
///
/// This is assertion-level: appenders are expected to present entries in
/// order, and a violation indicates a bug in the caller.
#[derive(Debug, Clone, Copy, Error)]
#[error("appending score {score} after {last} would break the configured order")]
pub struct OrderViolation {
    /// The score of the current last entry.
    pub last: f32,
    /// The score whose append was rejected.
    pub score: f32,
    /// The order the array is configured with.
    pub descending: bool,
}

impl From<OrderViolation> for crate::HnswError {
    #[track_caller]
    fn from(err: OrderViolation) -> Self {
        crate::HnswError::new(crate::HnswErrorKind::OrderViolation, err)
    }
}

///////////
// Tests //
///////////
