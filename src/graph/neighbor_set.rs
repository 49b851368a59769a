/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::trace;

use crate::graph::ScoreCache;
use crate::neighbor::{ConcurrentNeighborArray, NeighborArray};
use crate::similarity::{NeighborSimilarity, ScoreFunction};
use crate::{HnswError, HnswErrorKind, HnswResult, NodeId};

/// A concurrent set of neighbors for one graph node.
///
/// The neighbor list is published as an immutable
/// [`ConcurrentNeighborArray`] snapshot behind an atomic reference.
/// Even though updating is expensive (every mutation copies the whole
/// list), this beats a locking collection because "iterate a node's
/// neighbors" is the hot loop of graph search and insertion: readers
/// load the snapshot and walk two dense arrays with no synchronization
/// beyond the atomic load. The list is bounded by `max_connections`, so
/// the copy a writer pays is small.
///
/// Mutators run a compare-and-swap retry loop: read the current
/// snapshot, build the next one from a copy, and attempt to install it;
/// on losing a race, retry against the fresh snapshot. Each published
/// snapshot is therefore a pure function of some previous snapshot plus
/// one operation, which makes updates to a single set linearizable. No
/// partially-built state is ever visible, and a failure while computing
/// the next snapshot (a similarity provider error) leaves the published
/// snapshot untouched.
pub struct ConcurrentNeighborSet<S> {
    /// The node whose neighbors this set stores.
    node_id: NodeId,

    /// The maximum number of neighbors the set may hold.
    max_connections: usize,

    /// The diversity relaxation parameter, `>= 1.0`. With `alpha == 1.0`
    /// pruning applies the strict relative-neighborhood rule; larger
    /// values admit more edges.
    alpha: f32,

    /// Shared similarity provider, safe for concurrent invocation.
    similarity: Arc<S>,

    /// The current snapshot, sorted best-first, never larger than
    /// `max_connections` after a mutation completes.
    neighbors: ArcSwap<ConcurrentNeighborArray>,
}

impl<S> ConcurrentNeighborSet<S> {
    /// Create an empty neighbor set for `node_id` with the strict
    /// diversity rule (`alpha == 1.0`).
    pub fn new(node_id: NodeId, max_connections: usize, similarity: Arc<S>) -> Self {
        Self::with_alpha(node_id, max_connections, similarity, 1.0)
    }

    /// Create an empty neighbor set with a relaxed diversity rule.
    pub fn with_alpha(
        node_id: NodeId,
        max_connections: usize,
        similarity: Arc<S>,
        alpha: f32,
    ) -> Self {
        debug_assert!(max_connections > 0, "a neighbor set must hold at least one edge");
        debug_assert!(alpha >= 1.0, "alpha relaxes the diversity rule and must be >= 1.0");
        Self {
            node_id,
            max_connections,
            alpha,
            similarity,
            neighbors: ArcSwap::from_pointee(ConcurrentNeighborArray::new(max_connections, true)),
        }
    }

    /// The id of the node whose neighbors this set stores.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The maximum number of neighbors the set may hold.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// The diversity relaxation parameter the set was created with.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// The number of neighbors in the current snapshot.
    pub fn len(&self) -> usize {
        self.neighbors.load().len()
    }

    /// Return `true` if the current snapshot holds no neighbors.
    pub fn is_empty(&self) -> bool {
        self.neighbors.load().is_empty()
    }

    /// The backing-array length of the current snapshot.
    pub fn array_len(&self) -> usize {
        self.neighbors.load().capacity()
    }

    /// Return the current snapshot.
    ///
    /// The snapshot is immutable; holders may retain it for as long as
    /// they like without blocking writers.
    pub fn get_current(&self) -> Arc<ConcurrentNeighborArray> {
        self.neighbors.load_full()
    }

    /// Iterate over the node ids of the current snapshot.
    ///
    /// The iterator holds the snapshot it started from and is unaffected
    /// by concurrent mutation.
    pub fn node_iter(&self) -> NodeIterator {
        NodeIterator {
            snapshot: self.get_current(),
            index: 0,
        }
    }

    /// Return `true` if `node` is currently a neighbor.
    ///
    /// This is a linear search, intended for tests and assertions.
    pub fn contains(&self, node: NodeId) -> bool {
        self.node_iter().any(|id| id == node)
    }
}

/// Cloning shares the current snapshot; the clone and the original
/// diverge on their next respective writes.
impl<S> Clone for ConcurrentNeighborSet<S> {
    fn clone(&self) -> Self {
        Self {
            node_id: self.node_id,
            max_connections: self.max_connections,
            alpha: self.alpha,
            similarity: Arc::clone(&self.similarity),
            neighbors: ArcSwap::new(self.neighbors.load_full()),
        }
    }
}

impl<S> std::fmt::Debug for ConcurrentNeighborSet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentNeighborSet")
            .field("node_id", &self.node_id)
            .field("max_connections", &self.max_connections)
            .field("alpha", &self.alpha)
            .field("neighbors", &**self.neighbors.load())
            .finish()
    }
}

impl<S> ConcurrentNeighborSet<S>
where
    S: NeighborSimilarity,
{
    /// Insert a new neighbor, maintaining the size cap by removing the
    /// least diverse neighbor if necessary.
    ///
    /// Inserting an (id, score) pair already present is a no-op.
    /// Offering the set's own node errors with
    /// [`HnswErrorKind::SelfLoop`].
    pub fn insert(&self, neighbor_id: NodeId, score: f32) -> HnswResult<()> {
        self.insert_with_alpha(neighbor_id, score, 1.0)
    }

    /// [`Self::insert`] with an explicit diversity relaxation for the
    /// cap-enforcement pass.
    pub fn insert_with_alpha(
        &self,
        neighbor_id: NodeId,
        score: f32,
        alpha: f32,
    ) -> HnswResult<()> {
        if neighbor_id == self.node_id {
            return Err(SelfLoop { node: self.node_id }.into());
        }
        self.update(|next| {
            next.insert_sorted(neighbor_id, score);
            self.enforce_max_conn_limit(next, alpha, None)
        })
    }

    /// Select a diverse subset of `candidates` and splice it into the
    /// set.
    ///
    /// `candidates` must be sorted best-first. Selection runs an
    /// ascending ladder of relaxation values from `1.0` up to the set's
    /// `alpha` in steps of `0.2`. Each rung walks the candidates from
    /// worst to best and accepts any not-yet-selected candidate that is
    /// diverse, at the current relaxation, with respect to everything
    /// already selected — whether selected by an earlier rung or this
    /// one. The ladder stops early once `max_connections` candidates are
    /// selected, so slots fill with the strictest-diverse edges first
    /// and the rule only relaxes when needed to reach the cap.
    ///
    /// The selected candidates are spliced into the current snapshot in
    /// one atomic update that also re-enforces the size cap at strict
    /// diversity.
    pub fn insert_diverse(&self, candidates: &NeighborArray) -> HnswResult<()> {
        debug_assert!(candidates.scores_descending(), "candidates must be sorted best-first");

        let mut selected = vec![false; candidates.len()];
        let mut n_selected = 0usize;
        let mut scores = ScoreCache::new();

        // The 0.2 grid is not exactly representable in f32, so derive the
        // rung count once (with tolerance for the representation error)
        // instead of accumulating toward a float bound.
        let rungs = (((self.alpha - 1.0) / 0.2) + 1e-3).floor() as u32;
        for step in 0..=rungs {
            if n_selected >= self.max_connections {
                break;
            }
            let a = 1.0 + 0.2 * step as f32;

            for i in (0..candidates.len()).rev() {
                if selected[i] {
                    continue;
                }
                let c_node = candidates.nodes()[i];
                if c_node == self.node_id {
                    // The base node never joins its own neighbor list.
                    continue;
                }
                let c_score = candidates.scores()[i];
                if self.is_diverse(c_node, c_score, candidates, &selected, a, &mut scores)? {
                    selected[i] = true;
                    n_selected += 1;
                }
            }
        }

        trace!(
            "selected {} of {} candidates for node {}",
            n_selected,
            candidates.len(),
            self.node_id,
        );
        self.insert_multiple(candidates, &selected, &mut scores)
    }

    /// For each neighbor currently in the snapshot, install the reverse
    /// edge on that neighbor's set.
    ///
    /// This is a best-effort fanout: no atomicity holds across
    /// neighbors, and each child insert is independently atomic. The
    /// neighbor list walked is the snapshot at call time; edges added
    /// concurrently are the caller's concern.
    pub fn backlink<'a, F>(&self, neighborhood_of: F) -> HnswResult<()>
    where
        S: 'a,
        F: Fn(NodeId) -> &'a ConcurrentNeighborSet<S>,
    {
        let neighbors = self.neighbors.load();
        for neighbor in neighbors.iter() {
            trace!("adding back-edge from {} to {}", neighbor.id, self.node_id);
            neighborhood_of(neighbor.id).insert(self.node_id, neighbor.score)?;
        }
        Ok(())
    }

    /// Run the compare-and-swap retry loop.
    ///
    /// `mutate` builds the next snapshot from a copy of the current one.
    /// If it fails, the error propagates and nothing is published. On a
    /// lost race the loop retries against the fresh snapshot; each
    /// successful swap makes global progress, so the scheme is
    /// obstruction-free.
    fn update<F>(&self, mut mutate: F) -> HnswResult<()>
    where
        F: FnMut(&mut ConcurrentNeighborArray) -> HnswResult<()>,
    {
        loop {
            let current = self.neighbors.load();
            let mut next = current.copy();
            mutate(&mut next)?;

            let previous = self.neighbors.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &*current) {
                return Ok(());
            }
        }
    }

    /// Splice the selected candidates into the snapshot and re-enforce
    /// the size cap, as one atomic update.
    fn insert_multiple(
        &self,
        candidates: &NeighborArray,
        selected: &[bool],
        scores: &mut ScoreCache,
    ) -> HnswResult<()> {
        self.update(|next| {
            for i in (0..candidates.len()).rev() {
                if !selected[i] {
                    continue;
                }
                next.insert_sorted(candidates.nodes()[i], candidates.scores()[i]);
            }
            self.enforce_max_conn_limit(next, 1.0, Some(&mut *scores))
        })
    }

    /// Is the candidate, at the given relaxation, closer to the base
    /// node than it is to every already-selected candidate?
    fn is_diverse(
        &self,
        node: NodeId,
        score: f32,
        candidates: &NeighborArray,
        selected: &[bool],
        alpha: f32,
        scores: &mut ScoreCache,
    ) -> HnswResult<bool> {
        if candidates.is_empty() {
            return Ok(true);
        }

        let mut scorer = self.similarity.score_provider(node)?;
        for i in selected
            .iter()
            .enumerate()
            .filter_map(|(i, &chosen)| chosen.then_some(i))
        {
            let other = candidates.nodes()[i];
            if node == other {
                // The candidate is already chosen; it does not
                // disqualify itself.
                break;
            }
            if scores.get(node, other, &mut scorer)? > score * alpha {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Drop entries until the snapshot fits within `max_connections`.
    fn enforce_max_conn_limit(
        &self,
        neighbors: &mut ConcurrentNeighborArray,
        alpha: f32,
        mut scores: Option<&mut ScoreCache>,
    ) -> HnswResult<()> {
        while neighbors.len() > self.max_connections {
            self.remove_least_diverse(neighbors, alpha, scores.as_deref_mut())?;
        }
        Ok(())
    }

    /// For each entry `e1` starting from the worst, look at every entry
    /// `e2` that is closer to the base node. If some `e2` is closer to
    /// `e1` than `e1` is to the base node (scaled by `alpha`), `e1` is
    /// non-diverse: remove it and stop.
    ///
    /// If every pair is diverse, remove the entry farthest from the base
    /// node. Removing the dominated worst entry — rather than simply the
    /// farthest — preserves the long-range edges the graph needs to stay
    /// navigable.
    fn remove_least_diverse(
        &self,
        neighbors: &mut ConcurrentNeighborArray,
        alpha: f32,
        mut scores: Option<&mut ScoreCache>,
    ) -> HnswResult<()> {
        for i in (1..neighbors.len()).rev() {
            let e1 = neighbors.nodes()[i];
            let base_score = neighbors.scores()[i];
            let mut scorer = self.similarity.score_provider(e1)?;

            for j in (0..i).rev() {
                let e2 = neighbors.nodes()[j];
                let pair_score = match scores.as_deref_mut() {
                    Some(cache) => cache.get(e1, e2, &mut scorer)?,
                    None => scorer.apply(e2)?,
                };
                if pair_score > base_score * alpha {
                    neighbors.remove_index(i);
                    return Ok(());
                }
            }
        }

        let last = neighbors.len() - 1;
        neighbors.remove_index(last);
        Ok(())
    }
}

/// A self-loop was offered to [`ConcurrentNeighborSet::insert`].
///
/// A node never stores itself as a neighbor; hitting this error means
/// the calling graph builder mixed up its edge endpoints.
#[derive(Debug, Clone, Copy, Error)]
#[error("node {node} cannot be added as its own neighbor")]
pub struct SelfLoop {
    /// The offending node id.
    pub node: NodeId,
}

impl From<SelfLoop> for HnswError {
    #[track_caller]
    fn from(err: SelfLoop) -> Self {
        HnswError::new(HnswErrorKind::SelfLoop, err)
    }
}

//////////////////
// NodeIterator //
//////////////////

/// Iterator over the node ids of one snapshot.
///
/// Holds the snapshot it was created from, so iteration is stable under
/// concurrent mutation of the owning set.
#[derive(Debug)]
pub struct NodeIterator {
    snapshot: Arc<ConcurrentNeighborArray>,
    index: usize,
}

impl Iterator for NodeIterator {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.snapshot.nodes().get(self.index).copied();
        if node.is_some() {
            self.index += 1;
        }
        node
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for NodeIterator {}

///////////
// Tests //
///////////
