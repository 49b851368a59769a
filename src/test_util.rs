/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Similarity providers for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::similarity::{NeighborSimilarity, ScoreFunction};
use crate::{HnswError, HnswErrorKind, HnswResult, NodeId};

/// A similarity provider backed by an explicit table of pairwise scores.
///
/// Lookups are symmetric; pairs absent from the table score `0.0`.
pub(crate) struct TableSimilarity {
    scores: HashMap<(NodeId, NodeId), f32>,
    fail: bool,
}

impl TableSimilarity {
    pub(crate) fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ((NodeId, NodeId), f32)>,
    {
        Self {
            scores: entries.into_iter().collect(),
            fail: false,
        }
    }

    /// Every distinct pair scores `0.0` (all edges diverse).
    pub(crate) fn zero() -> Self {
        Self::new([])
    }

    /// A provider whose `score_provider` always fails, for exercising
    /// error propagation.
    pub(crate) fn failing() -> Self {
        Self {
            scores: HashMap::new(),
            fail: true,
        }
    }

    fn lookup(&self, a: NodeId, b: NodeId) -> f32 {
        self.scores
            .get(&(a, b))
            .or_else(|| self.scores.get(&(b, a)))
            .copied()
            .unwrap_or(0.0)
    }
}

impl NeighborSimilarity for TableSimilarity {
    type Scorer<'a> = TableScorer<'a>;

    fn score_provider(&self, node1: NodeId) -> HnswResult<Self::Scorer<'_>> {
        if self.fail {
            return Err(HnswError::message(
                HnswErrorKind::Similarity,
                "similarity provider failed",
            ));
        }
        Ok(TableScorer {
            table: self,
            anchor: node1,
            calls: None,
        })
    }
}

pub(crate) struct TableScorer<'a> {
    table: &'a TableSimilarity,
    anchor: NodeId,
    calls: Option<&'a AtomicUsize>,
}

impl ScoreFunction for TableScorer<'_> {
    fn apply(&mut self, node: NodeId) -> HnswResult<f32> {
        if let Some(calls) = self.calls {
            calls.fetch_add(1, Ordering::Relaxed);
        }
        Ok(self.table.lookup(self.anchor, node))
    }
}

/// A [`TableSimilarity`] that counts score computations, for asserting
/// on cache effectiveness.
pub(crate) struct CountingSimilarity {
    inner: TableSimilarity,
    calls: AtomicUsize,
}

impl CountingSimilarity {
    pub(crate) fn zero() -> Self {
        Self {
            inner: TableSimilarity::zero(),
            calls: AtomicUsize::new(0),
        }
    }

    /// The number of score computations performed so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl NeighborSimilarity for CountingSimilarity {
    type Scorer<'a> = TableScorer<'a>;

    fn score_provider(&self, node1: NodeId) -> HnswResult<Self::Scorer<'_>> {
        Ok(TableScorer {
            table: &self.inner,
            anchor: node1,
            calls: Some(&self.calls),
        })
    }
}
