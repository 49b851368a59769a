/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The similarity seam between neighbor sets and vector storage.
//!
//! The core never touches raw vectors. Diversity checks and pruning ask
//! an implementation of [`NeighborSimilarity`] for pairwise scores, and
//! batch comparisons go through a bound [`ScoreFunction`] so the
//! implementation can load the anchor node's vector once (potentially
//! from disk) instead of once per comparison.

use crate::{HnswResult, NodeId};

/// Encapsulates comparing node similarities for diversity checks.
///
/// Scores are symmetric and larger means more similar. Implementations
/// must be safe for concurrent invocation: one provider is shared by
/// every neighbor set in a graph.
///
/// Failures (for example, an underlying vector read) should be surfaced
/// with [`HnswErrorKind::Similarity`](crate::HnswErrorKind::Similarity);
/// they propagate unchanged to the caller of the operation that needed
/// the score.
pub trait NeighborSimilarity: Send + Sync {
    /// The bound scorer returned by [`Self::score_provider`].
    type Scorer<'a>: ScoreFunction
    where
        Self: 'a;

    /// One-off comparison between two nodes.
    fn score(&self, node1: NodeId, node2: NodeId) -> HnswResult<f32> {
        let mut scorer = self.score_provider(node1)?;
        scorer.apply(node2)
    }

    /// A scorer bound to `node1`, for comparing it against multiple other
    /// nodes.
    ///
    /// The returned scorer is used single-threaded within one pruning
    /// pass and discarded afterwards; it may carry state (such as the
    /// anchor's loaded vector).
    fn score_provider(&self, node1: NodeId) -> HnswResult<Self::Scorer<'_>>;
}

/// A scorer bound to a fixed anchor node.
pub trait ScoreFunction {
    /// Return the similarity between the anchor and `node`.
    fn apply(&mut self, node: NodeId) -> HnswResult<f32>;
}

/// Closures over a node id are scorers.
impl<F> ScoreFunction for F
where
    F: FnMut(NodeId) -> HnswResult<f32>,
{
    fn apply(&mut self, node: NodeId) -> HnswResult<f32> {
        self(node)
    }
}

#[cfg(test)]
mod similarity_test {
    use super::*;
    use crate::test_util::TableSimilarity;

    #[test]
    fn score_defaults_to_bound_scorer() {
        let table = TableSimilarity::new([((1, 2), 0.25)]);
        assert_eq!(table.score(1, 2).unwrap(), 0.25);
        assert_eq!(table.score(2, 1).unwrap(), 0.25);
    }

    #[test]
    fn closures_are_scorers() {
        let mut calls = 0usize;
        let mut scorer = |node: NodeId| {
            calls += 1;
            Ok(node as f32)
        };
        assert_eq!(scorer.apply(3).unwrap(), 3.0);
        assert_eq!(scorer.apply(7).unwrap(), 7.0);
        drop(scorer);
        assert_eq!(calls, 2);
    }
}
